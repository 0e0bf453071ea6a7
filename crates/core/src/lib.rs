//! Procurement quotation comparison and price resolution.
//!
//! Pure domain crate: entities, the pricing engine, the quotation workflow and
//! import validation. Persistence lives in `procura-db`.

pub mod access;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod import;
pub mod pricing;

pub use access::AccessGrant;
pub use domain::period::Period;
pub use domain::price_history::{PriceHistoryEntry, PriceType};
pub use domain::product::{Product, ProductId};
pub use domain::quotation::{
    PriceField, PriceUpdate, Quotation, QuotationId, QuotationStatus, QuoteItem, QuoteItemId,
};
pub use domain::supplier::{Supplier, SupplierId};
pub use domain::team::{Demand, ServiceScope, Team, TeamId, TeamKind};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{FlowEngine, FlowEvent, TransitionOutcome};
