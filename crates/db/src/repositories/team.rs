use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use procura_core::domain::period::Period;
use procura_core::domain::product::ProductId;
use procura_core::domain::supplier::SupplierId;
use procura_core::domain::team::{Demand, ServiceScope, Team, TeamId, TeamKind};

use super::codec::{decimal_text, parse_decimal, parse_period};
use super::{RepositoryError, TeamRepository};
use crate::DbPool;

const TEAM_COLUMNS: &str = "id, code, name, region, kind, active";

pub struct SqlTeamRepository {
    pool: DbPool,
}

impl SqlTeamRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TeamRepository for SqlTeamRepository {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TEAM_COLUMNS} FROM team WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(team_from_row).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Team>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TEAM_COLUMNS} FROM team WHERE code = trim(?)"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.map(team_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Team>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {TEAM_COLUMNS} FROM team ORDER BY code ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(team_from_row).collect()
    }

    async fn save(&self, team: &Team) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO team (id, code, name, region, kind, active)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                name = excluded.name,
                region = excluded.region,
                kind = excluded.kind,
                active = excluded.active",
        )
        .bind(&team.id.0)
        .bind(&team.code)
        .bind(&team.name)
        .bind(team.region.as_deref())
        .bind(team.kind.as_str())
        .bind(team.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn scopes_for_team(&self, team: &TeamId) -> Result<Vec<ServiceScope>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT supplier_id, team_id, active FROM service_scope
             WHERE team_id = ? ORDER BY supplier_id ASC",
        )
        .bind(&team.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ServiceScope {
                    supplier_id: SupplierId(row.try_get("supplier_id")?),
                    team_id: TeamId(row.try_get("team_id")?),
                    active: row.try_get("active")?,
                })
            })
            .collect()
    }

    async fn save_scope(&self, scope: &ServiceScope) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO service_scope (supplier_id, team_id, active, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(supplier_id, team_id) DO UPDATE SET
                active = excluded.active,
                updated_at = excluded.updated_at",
        )
        .bind(&scope.supplier_id.0)
        .bind(&scope.team_id.0)
        .bind(scope.active)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn demand_for(
        &self,
        team: &TeamId,
        period: Period,
    ) -> Result<Vec<Demand>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT team_id, product_id, period, quantity FROM demand
             WHERE team_id = ? AND period = ? ORDER BY product_id ASC",
        )
        .bind(&team.0)
        .bind(period.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(demand_from_row).collect()
    }

    async fn save_demand(&self, demand: &Demand) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO demand (team_id, product_id, period, quantity)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(team_id, product_id, period) DO UPDATE SET
                quantity = excluded.quantity",
        )
        .bind(&demand.team_id.0)
        .bind(&demand.product_id.0)
        .bind(demand.period.to_string())
        .bind(decimal_text(demand.quantity))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn team_from_row(row: SqliteRow) -> Result<Team, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    Ok(Team {
        id: TeamId(row.try_get("id")?),
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        region: row.try_get("region")?,
        kind: kind
            .parse::<TeamKind>()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        active: row.try_get("active")?,
    })
}

fn demand_from_row(row: SqliteRow) -> Result<Demand, RepositoryError> {
    Ok(Demand {
        team_id: TeamId(row.try_get("team_id")?),
        product_id: ProductId(row.try_get("product_id")?),
        period: parse_period(row.try_get("period")?)?,
        quantity: parse_decimal("quantity", row.try_get("quantity")?)?,
    })
}
