//! Transactional operations over the repositories. Every mutating call takes an
//! [`AccessGrant`](procura_core::AccessGrant) resolved by the caller; reads do not.

use std::collections::BTreeSet;

use thiserror::Error;

use procura_core::domain::product::{Product, ProductId};
use procura_core::errors::{ApplicationError, DomainError};
use procura_core::import::ImportError;
use procura_core::pricing::matrix::QuotationSnapshot;

use crate::repositories::{ProductRepository, RepositoryError};

pub mod catalog;
pub mod comparison;
pub mod import;
pub mod price_list;
pub mod workflow;

pub use catalog::{CatalogService, ProductInput, SupplierInput};
pub use comparison::ComparisonService;
pub use import::ImportService;
pub use price_list::PriceListService;
pub use workflow::{TransitionReceipt, WorkflowService};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Import(#[from] ImportError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(error))
    }
}

impl From<ServiceError> for ApplicationError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Domain(error) => Self::Domain(error),
            ServiceError::Repository(error) => Self::Persistence(error.to_string()),
            ServiceError::Import(ImportError::Storage(message)) => Self::Persistence(message),
            ServiceError::Import(ImportError::DuplicateQuotation { code }) => {
                Self::Domain(DomainError::Conflict(format!("quotation `{code}` already exists")))
            }
            ServiceError::Import(error @ ImportError::QuotationLocked { .. }) => {
                Self::Domain(DomainError::Conflict(error.to_string()))
            }
            ServiceError::Import(error) => {
                Self::Domain(DomainError::validation("import", error.to_string()))
            }
        }
    }
}

/// Products referenced by any line item, soft-deleted ones included so that
/// historical quotations still render.
pub(crate) async fn referenced_products<R>(
    repository: &R,
    snapshots: &[QuotationSnapshot],
) -> Result<Vec<Product>, RepositoryError>
where
    R: ProductRepository + ?Sized,
{
    let ids: BTreeSet<&ProductId> = snapshots
        .iter()
        .flat_map(|snapshot| snapshot.items.iter().map(|item| &item.product_id))
        .collect();

    let mut products = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(product) = repository.find_by_id(id).await? {
            products.push(product);
        }
    }
    Ok(products)
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::fixtures::DemoSeedDataset;
    use crate::{connect_with_settings, migrations, DbPool};

    pub(crate) async fn empty_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    pub(crate) async fn seeded_pool() -> DbPool {
        let pool = empty_pool().await;
        DemoSeedDataset::load(&pool).await.expect("seed");
        pool
    }
}
