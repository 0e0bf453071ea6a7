use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Expected shape of each seeded quotation.
const SEED_QUOTATIONS: &[SeedQuotationContract] = &[
    SeedQuotationContract {
        quotation_id: "qt-fresh-202401",
        supplier_id: "sup-fresh",
        period: "2024-01-01",
        status: "approved",
        expected_item_count: 2,
        expected_history_count: 2,
        description: "January baseline, approved with history",
    },
    SeedQuotationContract {
        quotation_id: "qt-fresh-202402",
        supplier_id: "sup-fresh",
        period: "2024-02-01",
        status: "approved",
        expected_item_count: 3,
        expected_history_count: 2,
        description: "February approval, one unapproved cabbage line",
    },
    SeedQuotationContract {
        quotation_id: "qt-ocean-202402",
        supplier_id: "sup-ocean",
        period: "2024-02-01",
        status: "negotiation",
        expected_item_count: 2,
        expected_history_count: 0,
        description: "February quotation mid-negotiation",
    },
    SeedQuotationContract {
        quotation_id: "qt-green-202402",
        supplier_id: "sup-green",
        period: "2024-02-01",
        status: "pending",
        expected_item_count: 2,
        expected_history_count: 0,
        description: "Pending quotation from an out-of-scope supplier",
    },
];

const SEED_SUPPLIER_IDS: &[&str] = &["sup-fresh", "sup-ocean", "sup-green"];
const SEED_PRODUCT_IDS: &[&str] = &["prod-rice", "prod-pork", "prod-fish", "prod-cabbage"];
const SEED_TEAM_IDS: &[&str] = &["team-k1", "team-k2", "team-hq"];

/// Deterministic demo dataset for the North region across two periods.
///
/// Covers an approved baseline with price history, a newer approval, a quotation
/// under negotiation and an out-of-scope pending one, plus a kitchen demand
/// override and a head-office team without a region.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Loads the dataset. Safe to call repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let quotations_seeded = SEED_QUOTATIONS
            .iter()
            .map(|quotation| SeedQuotationInfo {
                quotation_id: quotation.quotation_id,
                status: quotation.status,
                description: quotation.description,
            })
            .collect();

        Ok(SeedResult {
            suppliers: SEED_SUPPLIER_IDS.len(),
            products: SEED_PRODUCT_IDS.len(),
            teams: SEED_TEAM_IDS.len(),
            quotations_seeded,
        })
    }

    /// Checks that every seeded row is present and matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        checks.push(("suppliers", count_ids(pool, "supplier", SEED_SUPPLIER_IDS).await?));
        checks.push(("products", count_ids(pool, "product", SEED_PRODUCT_IDS).await?));
        checks.push(("teams", count_ids(pool, "team", SEED_TEAM_IDS).await?));

        for quotation in SEED_QUOTATIONS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                    SELECT 1 FROM quotation
                    WHERE id = ?1 AND supplier_id = ?2 AND period = ?3 AND status = ?4
                 )",
            )
            .bind(quotation.quotation_id)
            .bind(quotation.supplier_id)
            .bind(quotation.period)
            .bind(quotation.status)
            .fetch_one(pool)
            .await?;
            checks.push((quotation.quotation_id, exists == 1));

            let items: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM quote_item WHERE quotation_id = ?1")
                    .bind(quotation.quotation_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((quotation.item_count_label(), items == quotation.expected_item_count));

            let history: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM price_history WHERE quotation_id = ?1")
                    .bind(quotation.quotation_id)
                    .fetch_one(pool)
                    .await?;
            checks
                .push((quotation.history_count_label(), history == quotation.expected_history_count));
        }

        let scoped_out: i64 = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM service_scope
                WHERE supplier_id = 'sup-green' AND team_id = 'team-k1' AND active = 0
             )",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("green-scope-inactive", scoped_out == 1));

        let regionless: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM team WHERE id = 'team-hq' AND region IS NULL)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("hq-without-region", regionless == 1));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn count_ids(
    pool: &DbPool,
    table: &'static str,
    ids: &[&str],
) -> Result<bool, RepositoryError> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(1) FROM {table} WHERE id IN {}",
        sql_array_from_ids(ids)
    ))
    .fetch_one(pool)
    .await?;
    Ok(count == ids.len() as i64)
}

#[derive(Debug, Clone, Copy)]
struct SeedQuotationContract {
    quotation_id: &'static str,
    supplier_id: &'static str,
    period: &'static str,
    status: &'static str,
    expected_item_count: i64,
    expected_history_count: i64,
    description: &'static str,
}

impl SeedQuotationContract {
    fn item_count_label(&self) -> &'static str {
        match self.quotation_id {
            "qt-fresh-202401" => "fresh-202401-items",
            "qt-fresh-202402" => "fresh-202402-items",
            "qt-ocean-202402" => "ocean-202402-items",
            _ => "green-202402-items",
        }
    }

    fn history_count_label(&self) -> &'static str {
        match self.quotation_id {
            "qt-fresh-202401" => "fresh-202401-history",
            "qt-fresh-202402" => "fresh-202402-history",
            "qt-ocean-202402" => "ocean-202402-history",
            _ => "green-202402-history",
        }
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub suppliers: usize,
    pub products: usize,
    pub teams: usize,
    pub quotations_seeded: Vec<SeedQuotationInfo>,
}

#[derive(Debug)]
pub struct SeedQuotationInfo {
    pub quotation_id: &'static str,
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
