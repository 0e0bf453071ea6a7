use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use procura_core::domain::period::Period;
use procura_core::domain::price_history::PriceHistoryEntry;
use procura_core::domain::product::{Product, ProductId};
use procura_core::domain::quotation::{Quotation, QuotationId, QuoteItem, QuoteItemId};
use procura_core::domain::supplier::{Supplier, SupplierId};
use procura_core::domain::team::{Demand, ServiceScope, Team, TeamId};
use procura_core::pricing::matrix::QuotationSnapshot;

pub(crate) mod codec;
pub mod price_history;
pub mod product;
pub mod quotation;
pub mod supplier;
pub mod team;

pub use price_history::SqlPriceHistoryRepository;
pub use product::SqlProductRepository;
pub use quotation::{QuotationFilter, SqlQuotationRepository};
pub use supplier::SqlSupplierRepository;
pub use team::SqlTeamRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(error)) => error.is_unique_violation(),
            _ => false,
        }
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    /// Case-insensitive; soft-deleted rows are invisible.
    async fn find_by_code(&self, code: &str) -> Result<Option<Product>, RepositoryError>;
    async fn list_live(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn save(&self, product: &Product) -> Result<(), RepositoryError>;
    async fn soft_delete(&self, id: &ProductId, at: DateTime<Utc>)
        -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait SupplierRepository: Send + Sync {
    async fn find_by_id(&self, id: &SupplierId) -> Result<Option<Supplier>, RepositoryError>;
    /// Case-insensitive; soft-deleted rows are invisible.
    async fn find_by_code(&self, code: &str) -> Result<Option<Supplier>, RepositoryError>;
    async fn list_live(&self) -> Result<Vec<Supplier>, RepositoryError>;
    async fn save(&self, supplier: &Supplier) -> Result<(), RepositoryError>;
    async fn soft_delete(
        &self,
        id: &SupplierId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, RepositoryError>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Team>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Team>, RepositoryError>;
    async fn save(&self, team: &Team) -> Result<(), RepositoryError>;
    async fn scopes_for_team(&self, team: &TeamId) -> Result<Vec<ServiceScope>, RepositoryError>;
    async fn save_scope(&self, scope: &ServiceScope) -> Result<(), RepositoryError>;
    async fn demand_for(&self, team: &TeamId, period: Period)
        -> Result<Vec<Demand>, RepositoryError>;
    async fn save_demand(&self, demand: &Demand) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Quotation>, RepositoryError>;
    async fn list(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>, RepositoryError>;
    async fn items_for(&self, id: &QuotationId) -> Result<Vec<QuoteItem>, RepositoryError>;
    async fn find_item(&self, id: &QuoteItemId) -> Result<Option<QuoteItem>, RepositoryError>;
    /// Quotations with their supplier and items, ordered by supplier code.
    async fn snapshots(
        &self,
        filter: &QuotationFilter,
    ) -> Result<Vec<QuotationSnapshot>, RepositoryError>;
}

#[async_trait]
pub trait PriceHistoryRepository: Send + Sync {
    /// Entries for a region recorded for periods strictly before `before`.
    async fn list_before(
        &self,
        region: &str,
        before: Period,
    ) -> Result<Vec<PriceHistoryEntry>, RepositoryError>;
    async fn list_for_quotation(
        &self,
        id: &QuotationId,
    ) -> Result<Vec<PriceHistoryEntry>, RepositoryError>;
}
