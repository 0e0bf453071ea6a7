use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use procura_core::domain::fold_key;
use procura_core::domain::period::Period;
use procura_core::domain::price_history::{PriceHistoryEntry, PriceType};
use procura_core::domain::product::ProductId;
use procura_core::domain::quotation::QuotationId;
use procura_core::domain::supplier::SupplierId;

use super::codec::{decimal_text, parse_decimal, parse_period, parse_timestamp};
use super::{PriceHistoryRepository, RepositoryError};
use crate::DbPool;

const HISTORY_COLUMNS: &str =
    "id, product_id, supplier_id, period, region, price, price_type, quotation_id, recorded_at";

pub struct SqlPriceHistoryRepository {
    pool: DbPool,
}

impl SqlPriceHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PriceHistoryRepository for SqlPriceHistoryRepository {
    async fn list_before(
        &self,
        region: &str,
        before: Period,
    ) -> Result<Vec<PriceHistoryEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM price_history
             WHERE region_key = ? AND period < ?
             ORDER BY period ASC, recorded_at ASC"
        ))
        .bind(fold_key(region))
        .bind(before.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn list_for_quotation(
        &self,
        id: &QuotationId,
    ) -> Result<Vec<PriceHistoryEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM price_history
             WHERE quotation_id = ? ORDER BY recorded_at ASC, product_id ASC"
        ))
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }
}

/// Appends ledger rows on the caller's connection, usually an open transaction.
pub(crate) async fn append(
    conn: &mut SqliteConnection,
    entries: &[PriceHistoryEntry],
) -> Result<(), RepositoryError> {
    for entry in entries {
        sqlx::query(&format!(
            "INSERT INTO price_history ({HISTORY_COLUMNS}, region_key)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&entry.id)
        .bind(&entry.product_id.0)
        .bind(&entry.supplier_id.0)
        .bind(entry.period.to_string())
        .bind(&entry.region)
        .bind(decimal_text(entry.price))
        .bind(entry.price_type.as_str())
        .bind(&entry.quotation_id.0)
        .bind(entry.recorded_at.to_rfc3339())
        .bind(fold_key(&entry.region))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn entry_from_row(row: SqliteRow) -> Result<PriceHistoryEntry, RepositoryError> {
    let price_type: String = row.try_get("price_type")?;
    if price_type != PriceType::Approved.as_str() {
        return Err(RepositoryError::Decode(format!("unknown price_type `{price_type}`")));
    }
    Ok(PriceHistoryEntry {
        id: row.try_get("id")?,
        product_id: ProductId(row.try_get("product_id")?),
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        period: parse_period(row.try_get("period")?)?,
        region: row.try_get("region")?,
        price: parse_decimal("price", row.try_get("price")?)?,
        price_type: PriceType::Approved,
        quotation_id: QuotationId(row.try_get("quotation_id")?),
        recorded_at: parse_timestamp("recorded_at", row.try_get("recorded_at")?)?,
    })
}
