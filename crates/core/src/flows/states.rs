use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::quotation::QuotationStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowEvent {
    StartNegotiation,
    Approve,
    Cancel,
}

impl FlowEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartNegotiation => "start_negotiation",
            Self::Approve => "approve",
            Self::Cancel => "cancel",
        }
    }

    pub fn target(&self) -> QuotationStatus {
        match self {
            Self::StartNegotiation => QuotationStatus::Negotiation,
            Self::Approve => QuotationStatus::Approved,
            Self::Cancel => QuotationStatus::Cancelled,
        }
    }
}

impl fmt::Display for FlowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FlowEvent {
    type Err = crate::errors::DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "start_negotiation" | "negotiate" => Ok(Self::StartNegotiation),
            "approve" => Ok(Self::Approve),
            "cancel" => Ok(Self::Cancel),
            other => Err(crate::errors::DomainError::validation(
                "event",
                format!("unsupported workflow event `{other}` (expected negotiate|approve|cancel)"),
            )),
        }
    }
}

/// Side effects the persistence layer must perform together with the status write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    StampApprovedItems,
    WritePriceHistory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: QuotationStatus,
    pub to: QuotationStatus,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}

impl TransitionOutcome {
    pub fn requires(&self, action: FlowAction) -> bool {
        self.actions.contains(&action)
    }
}
