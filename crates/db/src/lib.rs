pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod services;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, SeedQuotationInfo, SeedResult, VerificationResult};
pub use repositories::RepositoryError;
pub use services::{
    CatalogService, ComparisonService, ImportService, PriceListService, ServiceError,
    TransitionReceipt, WorkflowService,
};
