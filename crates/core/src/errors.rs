use thiserror::Error;

use crate::domain::quotation::{PriceField, QuotationStatus};
use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid quotation transition from {from} to {to}")]
    InvalidQuotationTransition { from: QuotationStatus, to: QuotationStatus },
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("{} is locked while the quotation is {status}", field.as_str())]
    PriceFieldLocked { status: QuotationStatus, field: PriceField },
    #[error("{}", validation_message(field, *row, message))]
    Validation { field: String, row: Option<usize>, message: String },
    #[error("{entity} `{key}` was not found")]
    NotFound { entity: &'static str, key: String },
    #[error("team `{team}` has no region configured")]
    TeamWithoutRegion { team: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("caller `{actor}` may not manage quotations, suppliers or products")]
    Forbidden { actor: String },
    #[error("quotation `{quotation}` was modified concurrently (expected version {expected_version})")]
    ConcurrentModification { quotation: String, expected_version: i64 },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

fn validation_message(field: &str, row: Option<usize>, message: &str) -> String {
    match row {
        Some(row) => format!("validation failed at row {row}, field `{field}`: {message}"),
        None => format!("validation failed for `{field}`: {message}"),
    }
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), row: None, message: message.into() }
    }

    pub fn validation_at(
        row: usize,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation { field: field.into(), row: Some(row), message: message.into() }
    }

    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound { entity, key: key.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "A referenced record does not exist.",
            Self::Conflict { .. } => {
                "The change conflicts with existing data. Reload and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to perform this action.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                let message = error.to_string();
                match error {
                    DomainError::NotFound { .. } | DomainError::TeamWithoutRegion { .. } => {
                        Self::NotFound { message, correlation_id }
                    }
                    DomainError::Conflict(_) | DomainError::ConcurrentModification { .. } => {
                        Self::Conflict { message, correlation_id }
                    }
                    DomainError::Forbidden { .. } => Self::Forbidden { message, correlation_id },
                    DomainError::InvalidQuotationTransition { .. }
                    | DomainError::FlowTransition(_)
                    | DomainError::PriceFieldLocked { .. }
                    | DomainError::Validation { .. }
                    | DomainError::InvariantViolation(_) => {
                        Self::BadRequest { message, correlation_id }
                    }
                }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
