use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use procura_core::domain::product::{Product, ProductId};

use super::codec::{optional_decimal_text, parse_optional_decimal, parse_optional_timestamp};
use super::{ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, code, name, specification, unit, category, base_price, \
                               base_quantity, active, deleted_at";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(product_from_row).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product
             WHERE upper(code) = upper(trim(?)) AND deleted_at IS NULL"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(product_from_row).transpose()
    }

    async fn list_live(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE deleted_at IS NULL ORDER BY code ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    async fn save(&self, product: &Product) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO product (
                id, code, name, specification, unit, category, base_price, base_quantity,
                active, deleted_at, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                name = excluded.name,
                specification = excluded.specification,
                unit = excluded.unit,
                category = excluded.category,
                base_price = excluded.base_price,
                base_quantity = excluded.base_quantity,
                active = excluded.active,
                deleted_at = excluded.deleted_at,
                updated_at = excluded.updated_at",
        )
        .bind(&product.id.0)
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.specification.as_deref())
        .bind(&product.unit)
        .bind(product.category.as_deref())
        .bind(optional_decimal_text(product.base_price))
        .bind(optional_decimal_text(product.base_quantity))
        .bind(product.active)
        .bind(product.deleted_at.map(|value| value.to_rfc3339()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn soft_delete(
        &self,
        id: &ProductId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE product SET deleted_at = ?, active = 0, updated_at = ?
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

pub(crate) fn product_from_row(row: SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: ProductId(row.try_get("id")?),
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        specification: row.try_get("specification")?,
        unit: row.try_get("unit")?,
        category: row.try_get("category")?,
        base_price: parse_optional_decimal("base_price", row.try_get("base_price")?)?,
        base_quantity: parse_optional_decimal("base_quantity", row.try_get("base_quantity")?)?,
        active: row.try_get("active")?,
        deleted_at: parse_optional_timestamp("deleted_at", row.try_get("deleted_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use procura_core::domain::product::{Product, ProductId};

    use super::SqlProductRepository;
    use crate::repositories::ProductRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn product(id: &str, code: &str) -> Product {
        Product {
            id: ProductId(id.to_string()),
            code: code.to_string(),
            name: "Jasmine rice".to_string(),
            specification: Some("25kg sack".to_string()),
            unit: "kg".to_string(),
            category: Some("Dry goods".to_string()),
            base_price: Some(Decimal::new(1850050, 2)),
            base_quantity: Some(Decimal::from(50)),
            active: true,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn round_trip_and_case_insensitive_lookup() {
        let repo = SqlProductRepository::new(setup_pool().await);
        let rice = product("prod-rice", "RICE");
        repo.save(&rice).await.expect("save");

        assert_eq!(repo.find_by_id(&rice.id).await.expect("find"), Some(rice.clone()));
        assert_eq!(repo.find_by_code(" rice ").await.expect("find by code"), Some(rice));
    }

    #[tokio::test]
    async fn codes_are_unique_among_live_rows_only() {
        let repo = SqlProductRepository::new(setup_pool().await);
        repo.save(&product("prod-1", "RICE")).await.expect("first");

        let duplicate = repo.save(&product("prod-2", "rice")).await.expect_err("duplicate code");
        assert!(duplicate.is_unique_violation());

        assert!(repo.soft_delete(&ProductId("prod-1".to_string()), Utc::now()).await.expect("delete"));
        repo.save(&product("prod-2", "rice")).await.expect("code is free after soft delete");

        let found = repo.find_by_code("RICE").await.expect("lookup").expect("live row");
        assert_eq!(found.id, ProductId("prod-2".to_string()));
        assert_eq!(repo.list_live().await.expect("list").len(), 1);
        let deleted = repo.find_by_id(&ProductId("prod-1".to_string())).await.expect("find");
        assert!(deleted.is_some_and(|product| product.is_deleted() && !product.active));
    }
}
