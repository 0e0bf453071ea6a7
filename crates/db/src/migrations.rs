use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "supplier",
        "product",
        "team",
        "service_scope",
        "demand",
        "quotation",
        "quote_item",
        "price_history",
        "idx_supplier_code_live",
        "idx_product_code_live",
        "idx_quotation_supplier_period_region",
        "idx_quote_item_quotation_id",
        "idx_price_history_lookup",
        "price_history_no_update",
        "price_history_no_delete",
    ];

    #[tokio::test]
    async fn migrations_create_procurement_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ?")
                .bind(object)
                .fetch_one(&pool)
                .await
                .expect("query sqlite_master")
                .get::<i64, _>("count");
            assert_eq!(count, 1, "schema object `{object}` should exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");

        let applied = sqlx::query("SELECT COUNT(*) AS count FROM _sqlx_migrations")
            .fetch_one(&pool)
            .await
            .expect("applied migrations")
            .get::<i64, _>("count");
        assert_eq!(applied as usize, MIGRATOR.iter().count());
    }
}
