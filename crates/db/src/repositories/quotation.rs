use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqliteConnection};

use procura_core::domain::fold_key;
use procura_core::domain::period::Period;
use procura_core::domain::product::ProductId;
use procura_core::domain::quotation::{
    Quotation, QuotationId, QuotationStatus, QuoteItem, QuoteItemId,
};
use procura_core::domain::supplier::SupplierId;
use procura_core::pricing::matrix::QuotationSnapshot;

use super::codec::{
    date_text, decimal_text, optional_decimal_text, parse_date, parse_decimal,
    parse_optional_decimal, parse_optional_timestamp, parse_period, parse_timestamp, parse_u32,
};
use super::supplier::supplier_from_row_prefixed;
use super::{QuotationRepository, RepositoryError};
use crate::DbPool;

const QUOTATION_COLUMNS: &str = "q.id, q.code, q.period, q.region, q.category, q.supplier_id, \
                                 q.status, q.version, q.quote_date, q.created_at, q.updated_at";

const ITEM_COLUMNS: &str = "id, quotation_id, product_id, quantity, initial_price, \
                            negotiated_price, approved_price, vat_pct, negotiation_round, \
                            approved_at, approved_by, notes";

/// Narrows quotation reads. Region and category match on their folded keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuotationFilter {
    pub period: Option<Period>,
    pub region: Option<String>,
    pub category: Option<String>,
    pub supplier_id: Option<SupplierId>,
    /// Empty means every status.
    pub statuses: Vec<QuotationStatus>,
}

impl QuotationFilter {
    pub fn for_period_region(period: Period, region: impl Into<String>) -> Self {
        Self { period: Some(period), region: Some(region.into()), ..Self::default() }
    }

    pub fn with_statuses(mut self, statuses: &[QuotationStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1 = 1");
        if let Some(period) = self.period {
            builder.push(" AND q.period = ").push_bind(period.to_string());
        }
        if let Some(region) = &self.region {
            builder.push(" AND q.region_key = ").push_bind(fold_key(region));
        }
        if let Some(category) = &self.category {
            builder.push(" AND q.category_key = ").push_bind(fold_key(category));
        }
        if let Some(supplier_id) = &self.supplier_id {
            builder.push(" AND q.supplier_id = ").push_bind(supplier_id.0.clone());
        }
        if !self.statuses.is_empty() {
            builder.push(" AND q.status IN (");
            let mut separated = builder.separated(", ");
            for status in &self.statuses {
                separated.push_bind(status.as_str());
            }
            separated.push_unseparated(")");
        }
    }
}

pub struct SqlQuotationRepository {
    pool: DbPool,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuotationRepository for SqlQuotationRepository {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_quotation_in(&mut conn, id).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Quotation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotation q WHERE upper(q.code) = upper(trim(?))"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| quotation_from_row(&row)).transpose()
    }

    async fn list(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>, RepositoryError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {QUOTATION_COLUMNS} FROM quotation q"));
        filter.push_where(&mut builder);
        builder.push(" ORDER BY q.period ASC, q.code ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(quotation_from_row).collect()
    }

    async fn items_for(&self, id: &QuotationId) -> Result<Vec<QuoteItem>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        items_in(&mut conn, id).await
    }

    async fn find_item(&self, id: &QuoteItemId) -> Result<Option<QuoteItem>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_item_in(&mut conn, id).await
    }

    async fn snapshots(
        &self,
        filter: &QuotationFilter,
    ) -> Result<Vec<QuotationSnapshot>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {QUOTATION_COLUMNS},
                    s.id AS s_id, s.code AS s_code, s.name AS s_name,
                    s.contact_person AS s_contact_person, s.phone AS s_phone,
                    s.email AS s_email, s.address AS s_address, s.active AS s_active,
                    s.deleted_at AS s_deleted_at
             FROM quotation q
             JOIN supplier s ON s.id = q.supplier_id"
        ));
        filter.push_where(&mut builder);
        builder.push(" ORDER BY upper(s.code) ASC, q.code ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut conn = self.pool.acquire().await?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            let quotation = quotation_from_row(row)?;
            let supplier = supplier_from_row_prefixed(row, "s_")?;
            let items = items_in(&mut conn, &quotation.id).await?;
            snapshots.push(QuotationSnapshot { quotation, supplier, items });
        }
        Ok(snapshots)
    }
}

pub(crate) async fn find_quotation_in(
    conn: &mut SqliteConnection,
    id: &QuotationId,
) -> Result<Option<Quotation>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {QUOTATION_COLUMNS} FROM quotation q WHERE q.id = ?"))
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|row| quotation_from_row(&row)).transpose()
}

/// The quotation occupying the (supplier, period, region, category) slot, if any.
pub(crate) async fn find_matching_in(
    conn: &mut SqliteConnection,
    supplier_id: &SupplierId,
    period: Period,
    region: &str,
    category: Option<&str>,
) -> Result<Option<Quotation>, RepositoryError> {
    let row = sqlx::query(&format!(
        "SELECT {QUOTATION_COLUMNS} FROM quotation q
         WHERE q.supplier_id = ? AND q.period = ? AND q.region_key = ? AND q.category_key = ?"
    ))
    .bind(&supplier_id.0)
    .bind(period.to_string())
    .bind(fold_key(region))
    .bind(category.map(fold_key).unwrap_or_default())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| quotation_from_row(&row)).transpose()
}

pub(crate) async fn find_item_in(
    conn: &mut SqliteConnection,
    id: &QuoteItemId,
) -> Result<Option<QuoteItem>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM quote_item WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|row| item_from_row(&row)).transpose()
}

pub(crate) async fn items_in(
    conn: &mut SqliteConnection,
    id: &QuotationId,
) -> Result<Vec<QuoteItem>, RepositoryError> {
    let rows = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM quote_item WHERE quotation_id = ? ORDER BY rowid ASC"
    ))
    .bind(&id.0)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(item_from_row).collect()
}

pub(crate) async fn insert_quotation(
    conn: &mut SqliteConnection,
    quotation: &Quotation,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO quotation (
            id, code, period, region, region_key, category, category_key, supplier_id, status,
            version, quote_date, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&quotation.id.0)
    .bind(&quotation.code)
    .bind(quotation.period.to_string())
    .bind(&quotation.region)
    .bind(fold_key(&quotation.region))
    .bind(quotation.category.as_deref())
    .bind(quotation.category.as_deref().map(fold_key).unwrap_or_default())
    .bind(&quotation.supplier_id.0)
    .bind(quotation.status.as_str())
    .bind(quotation.version)
    .bind(date_text(quotation.quote_date))
    .bind(quotation.created_at.to_rfc3339())
    .bind(quotation.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_item(
    conn: &mut SqliteConnection,
    item: &QuoteItem,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO quote_item (
            id, quotation_id, product_id, quantity, initial_price, negotiated_price,
            approved_price, vat_pct, negotiation_round, approved_at, approved_by, notes
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.id.0)
    .bind(&item.quotation_id.0)
    .bind(&item.product_id.0)
    .bind(decimal_text(item.quantity))
    .bind(optional_decimal_text(item.initial_price))
    .bind(optional_decimal_text(item.negotiated_price))
    .bind(optional_decimal_text(item.approved_price))
    .bind(decimal_text(item.vat_pct))
    .bind(i64::from(item.negotiation_round))
    .bind(item.approved_at.map(|value| value.to_rfc3339()))
    .bind(item.approved_by.as_deref())
    .bind(item.notes.as_deref())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn delete_items(
    conn: &mut SqliteConnection,
    id: &QuotationId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM quote_item WHERE quotation_id = ?")
        .bind(&id.0)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

/// Moves the quotation to `next` only if it still carries `expected_version`.
/// Returns false when another writer got there first.
pub(crate) async fn compare_and_set_status(
    conn: &mut SqliteConnection,
    id: &QuotationId,
    expected_version: i64,
    next: QuotationStatus,
    at: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE quotation SET status = ?, version = version + 1, updated_at = ?
         WHERE id = ? AND version = ?",
    )
    .bind(next.as_str())
    .bind(at.to_rfc3339())
    .bind(&id.0)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Stamps approver and time on every item carrying an approved price.
pub(crate) async fn stamp_approved_items(
    conn: &mut SqliteConnection,
    id: &QuotationId,
    actor: &str,
    at: DateTime<Utc>,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "UPDATE quote_item SET approved_at = ?, approved_by = ?
         WHERE quotation_id = ? AND approved_price IS NOT NULL",
    )
    .bind(at.to_rfc3339())
    .bind(actor)
    .bind(&id.0)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Writes the item's price fields while the parent is still in `expected_status`.
pub(crate) async fn update_item_prices(
    conn: &mut SqliteConnection,
    item: &QuoteItem,
    expected_status: QuotationStatus,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE quote_item SET
            initial_price = ?, negotiated_price = ?, approved_price = ?, vat_pct = ?,
            negotiation_round = ?
         WHERE id = ?
           AND EXISTS (
               SELECT 1 FROM quotation q WHERE q.id = quote_item.quotation_id AND q.status = ?
           )",
    )
    .bind(optional_decimal_text(item.initial_price))
    .bind(optional_decimal_text(item.negotiated_price))
    .bind(optional_decimal_text(item.approved_price))
    .bind(decimal_text(item.vat_pct))
    .bind(i64::from(item.negotiation_round))
    .bind(&item.id.0)
    .bind(expected_status.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Refreshes quote and update dates after an import replaced the line items.
pub(crate) async fn touch_quotation(
    conn: &mut SqliteConnection,
    id: &QuotationId,
    quote_date: NaiveDate,
    at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE quotation SET quote_date = ?, updated_at = ?, version = version + 1 WHERE id = ?",
    )
    .bind(date_text(quote_date))
    .bind(at.to_rfc3339())
    .bind(&id.0)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn quotation_from_row(row: &SqliteRow) -> Result<Quotation, RepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(Quotation {
        id: QuotationId(row.try_get("id")?),
        code: row.try_get("code")?,
        period: parse_period(row.try_get("period")?)?,
        region: row.try_get("region")?,
        category: row.try_get("category")?,
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        status: status
            .parse::<QuotationStatus>()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        version: row.try_get("version")?,
        quote_date: parse_date("quote_date", row.try_get("quote_date")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn item_from_row(row: &SqliteRow) -> Result<QuoteItem, RepositoryError> {
    Ok(QuoteItem {
        id: QuoteItemId(row.try_get("id")?),
        quotation_id: QuotationId(row.try_get("quotation_id")?),
        product_id: ProductId(row.try_get("product_id")?),
        quantity: parse_decimal("quantity", row.try_get("quantity")?)?,
        initial_price: parse_optional_decimal("initial_price", row.try_get("initial_price")?)?,
        negotiated_price: parse_optional_decimal(
            "negotiated_price",
            row.try_get("negotiated_price")?,
        )?,
        approved_price: parse_optional_decimal("approved_price", row.try_get("approved_price")?)?,
        vat_pct: parse_decimal("vat_pct", row.try_get("vat_pct")?)?,
        negotiation_round: parse_u32("negotiation_round", row.try_get("negotiation_round")?)?,
        approved_at: parse_optional_timestamp("approved_at", row.try_get("approved_at")?)?,
        approved_by: row.try_get("approved_by")?,
        notes: row.try_get("notes")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use procura_core::domain::product::{Product, ProductId};
    use procura_core::domain::quotation::{
        Quotation, QuotationId, QuotationStatus, QuoteItem, QuoteItemId,
    };
    use procura_core::domain::supplier::{Supplier, SupplierId};

    use super::{
        compare_and_set_status, delete_items, find_matching_in, insert_item, insert_quotation,
        update_item_prices, QuotationFilter, SqlQuotationRepository,
    };
    use crate::repositories::{
        ProductRepository, QuotationRepository, SqlProductRepository, SqlSupplierRepository,
        SupplierRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        for (id, code) in [("sup-a", "ALPHA"), ("sup-b", "BETA")] {
            SqlSupplierRepository::new(pool.clone())
                .save(&Supplier {
                    id: SupplierId(id.to_string()),
                    code: code.to_string(),
                    name: format!("{code} Trading"),
                    contact_person: None,
                    phone: None,
                    email: None,
                    address: None,
                    active: true,
                    deleted_at: None,
                })
                .await
                .expect("supplier");
        }
        SqlProductRepository::new(pool.clone())
            .save(&Product {
                id: ProductId("prod-rice".to_string()),
                code: "RICE".to_string(),
                name: "Jasmine rice".to_string(),
                specification: None,
                unit: "kg".to_string(),
                category: Some("Dry".to_string()),
                base_price: None,
                base_quantity: None,
                active: true,
                deleted_at: None,
            })
            .await
            .expect("product");
        pool
    }

    fn quotation(id: &str, supplier: &str, status: QuotationStatus) -> Quotation {
        Quotation {
            id: QuotationId(id.to_string()),
            code: format!("Q-202401-NORTH-{id}"),
            period: "2024-01-01".parse().expect("period"),
            region: "North".to_string(),
            category: None,
            supplier_id: SupplierId(supplier.to_string()),
            status,
            version: 1,
            quote_date: NaiveDate::from_ymd_opt(2024, 1, 5).expect("date"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: &str, quotation: &str) -> QuoteItem {
        QuoteItem {
            id: QuoteItemId(id.to_string()),
            quotation_id: QuotationId(quotation.to_string()),
            product_id: ProductId("prod-rice".to_string()),
            quantity: Decimal::from(50),
            initial_price: Some(Decimal::new(2_150_050, 2)),
            negotiated_price: None,
            approved_price: None,
            vat_pct: Decimal::from(5),
            negotiation_round: 0,
            approved_at: None,
            approved_by: None,
            notes: Some("bag 25kg".to_string()),
        }
    }

    async fn seed(pool: &DbPool) {
        let mut tx = pool.begin().await.expect("tx");
        insert_quotation(&mut tx, &quotation("qa", "sup-a", QuotationStatus::Pending))
            .await
            .expect("qa");
        insert_quotation(&mut tx, &quotation("qb", "sup-b", QuotationStatus::Cancelled))
            .await
            .expect("qb");
        insert_item(&mut tx, &item("ia", "qa")).await.expect("ia");
        insert_item(&mut tx, &item("ib", "qb")).await.expect("ib");
        tx.commit().await.expect("commit");
    }

    #[tokio::test]
    async fn snapshots_join_supplier_and_items_and_honour_status_filter() {
        let pool = setup_pool().await;
        seed(&pool).await;
        let repo = SqlQuotationRepository::new(pool);

        let period = "2024-01-01".parse().expect("period");
        let all = repo
            .snapshots(&QuotationFilter::for_period_region(period, "north"))
            .await
            .expect("snapshots");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].supplier.code, "ALPHA");
        assert_eq!(all[0].items, vec![item("ia", "qa")]);

        let live = repo
            .snapshots(
                &QuotationFilter::for_period_region(period, "North")
                    .with_statuses(&[QuotationStatus::Pending, QuotationStatus::Negotiation]),
            )
            .await
            .expect("filtered");
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].quotation.id, QuotationId("qa".to_string()));
    }

    #[tokio::test]
    async fn stale_version_loses_the_compare_and_swap() {
        let pool = setup_pool().await;
        seed(&pool).await;
        let id = QuotationId("qa".to_string());

        let mut conn = pool.acquire().await.expect("conn");
        assert!(compare_and_set_status(&mut conn, &id, 1, QuotationStatus::Negotiation, Utc::now())
            .await
            .expect("first writer"));
        assert!(!compare_and_set_status(&mut conn, &id, 1, QuotationStatus::Approved, Utc::now())
            .await
            .expect("second writer"));
        drop(conn);

        let stored = SqlQuotationRepository::new(pool)
            .find_by_id(&id)
            .await
            .expect("lookup")
            .expect("exists");
        assert_eq!(stored.status, QuotationStatus::Negotiation);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn price_updates_require_the_expected_parent_status() {
        let pool = setup_pool().await;
        seed(&pool).await;
        let mut conn = pool.acquire().await.expect("conn");

        let mut edited = item("ia", "qa");
        edited.negotiated_price = Some(Decimal::from(20_000));
        assert!(!update_item_prices(&mut conn, &edited, QuotationStatus::Negotiation)
            .await
            .expect("wrong status"));
        assert!(update_item_prices(&mut conn, &edited, QuotationStatus::Pending)
            .await
            .expect("pending"));
        drop(conn);

        let stored = SqlQuotationRepository::new(pool)
            .find_item(&QuoteItemId("ia".to_string()))
            .await
            .expect("lookup")
            .expect("exists");
        assert_eq!(stored.negotiated_price, Some(Decimal::from(20_000)));
    }

    #[tokio::test]
    async fn slot_lookup_ignores_region_case_and_item_replacement_clears_lines() {
        let pool = setup_pool().await;
        seed(&pool).await;
        let mut conn = pool.acquire().await.expect("conn");
        let period = "2024-01-01".parse().expect("period");

        let found = find_matching_in(&mut conn, &SupplierId("sup-a".to_string()), period, "NORTH", None)
            .await
            .expect("lookup")
            .expect("slot taken");
        assert_eq!(found.id, QuotationId("qa".to_string()));
        assert!(find_matching_in(
            &mut conn,
            &SupplierId("sup-a".to_string()),
            period,
            "North",
            Some("Dry")
        )
        .await
        .expect("category slot")
        .is_none());

        assert_eq!(delete_items(&mut conn, &found.id).await.expect("delete"), 1);
    }

    #[tokio::test]
    async fn non_ascii_regions_match_regardless_of_case() {
        let pool = setup_pool().await;
        let mut highland = quotation("qh", "sup-a", QuotationStatus::Pending);
        highland.region = "Miền Bắc".to_string();
        highland.category = Some("Rau Củ".to_string());
        let mut tx = pool.begin().await.expect("tx");
        insert_quotation(&mut tx, &highland).await.expect("insert");
        tx.commit().await.expect("commit");

        let period = "2024-01-01".parse().expect("period");
        let mut conn = pool.acquire().await.expect("conn");
        let found = find_matching_in(
            &mut conn,
            &SupplierId("sup-a".to_string()),
            period,
            " MIỀN BẮC ",
            Some("RAU CỦ"),
        )
        .await
        .expect("lookup");
        assert_eq!(found.map(|quotation| quotation.id), Some(QuotationId("qh".to_string())));
        drop(conn);

        let mut filter = QuotationFilter::for_period_region(period, "miền bắc");
        filter.category = Some("rau củ".to_string());
        let snapshots = SqlQuotationRepository::new(pool).snapshots(&filter).await.expect("snapshots");
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].quotation.region, "Miền Bắc");
    }
}
