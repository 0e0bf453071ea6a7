use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use procura_core::domain::supplier::{Supplier, SupplierId};

use super::codec::parse_optional_timestamp;
use super::{RepositoryError, SupplierRepository};
use crate::DbPool;

const SUPPLIER_COLUMNS: &str =
    "id, code, name, contact_person, phone, email, address, active, deleted_at";

pub struct SqlSupplierRepository {
    pool: DbPool,
}

impl SqlSupplierRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SupplierRepository for SqlSupplierRepository {
    async fn find_by_id(&self, id: &SupplierId) -> Result<Option<Supplier>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SUPPLIER_COLUMNS} FROM supplier WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(supplier_from_row).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Supplier>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM supplier
             WHERE upper(code) = upper(trim(?)) AND deleted_at IS NULL"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(supplier_from_row).transpose()
    }

    async fn list_live(&self) -> Result<Vec<Supplier>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM supplier WHERE deleted_at IS NULL ORDER BY code ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(supplier_from_row).collect()
    }

    async fn save(&self, supplier: &Supplier) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO supplier (
                id, code, name, contact_person, phone, email, address, active, deleted_at,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                name = excluded.name,
                contact_person = excluded.contact_person,
                phone = excluded.phone,
                email = excluded.email,
                address = excluded.address,
                active = excluded.active,
                deleted_at = excluded.deleted_at,
                updated_at = excluded.updated_at",
        )
        .bind(&supplier.id.0)
        .bind(&supplier.code)
        .bind(&supplier.name)
        .bind(supplier.contact_person.as_deref())
        .bind(supplier.phone.as_deref())
        .bind(supplier.email.as_deref())
        .bind(supplier.address.as_deref())
        .bind(supplier.active)
        .bind(supplier.deleted_at.map(|value| value.to_rfc3339()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn soft_delete(
        &self,
        id: &SupplierId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE supplier SET deleted_at = ?, active = 0, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(at.to_rfc3339())
        .bind(at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Reads the supplier columns; `prefix` selects aliased columns from a join.
pub(crate) fn supplier_from_row_prefixed(
    row: &SqliteRow,
    prefix: &str,
) -> Result<Supplier, RepositoryError> {
    let column = |name: &str| format!("{prefix}{name}");
    Ok(Supplier {
        id: SupplierId(row.try_get(column("id").as_str())?),
        code: row.try_get(column("code").as_str())?,
        name: row.try_get(column("name").as_str())?,
        contact_person: row.try_get(column("contact_person").as_str())?,
        phone: row.try_get(column("phone").as_str())?,
        email: row.try_get(column("email").as_str())?,
        address: row.try_get(column("address").as_str())?,
        active: row.try_get(column("active").as_str())?,
        deleted_at: parse_optional_timestamp(
            "deleted_at",
            row.try_get(column("deleted_at").as_str())?,
        )?,
    })
}

fn supplier_from_row(row: SqliteRow) -> Result<Supplier, RepositoryError> {
    supplier_from_row_prefixed(&row, "")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use procura_core::domain::supplier::{Supplier, SupplierId};

    use super::SqlSupplierRepository;
    use crate::repositories::SupplierRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn supplier(id: &str, code: &str) -> Supplier {
        Supplier {
            id: SupplierId(id.to_string()),
            code: code.to_string(),
            name: "Fresh Farm Co.".to_string(),
            contact_person: Some("Lan Tran".to_string()),
            phone: None,
            email: Some("sales@freshfarm.example".to_string()),
            address: None,
            active: true,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn soft_deleted_suppliers_are_hidden_from_code_lookup() {
        let repo = SqlSupplierRepository::new(setup_pool().await);
        let fresh = supplier("sup-fresh", "FRESH");
        repo.save(&fresh).await.expect("save");
        assert_eq!(repo.find_by_code("fresh").await.expect("lookup"), Some(fresh.clone()));

        assert!(repo.soft_delete(&fresh.id, Utc::now()).await.expect("delete"));
        assert!(!repo.soft_delete(&fresh.id, Utc::now()).await.expect("second delete is a no-op"));
        assert_eq!(repo.find_by_code("FRESH").await.expect("lookup"), None);
        assert!(repo.list_live().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn duplicate_live_code_is_a_unique_violation() {
        let repo = SqlSupplierRepository::new(setup_pool().await);
        repo.save(&supplier("sup-1", "OCEAN")).await.expect("first");
        let error = repo.save(&supplier("sup-2", "Ocean")).await.expect_err("duplicate");
        assert!(error.is_unique_violation());
    }
}
