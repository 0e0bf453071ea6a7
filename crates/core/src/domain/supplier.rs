use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupplierId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Supplier {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Single-line contact used by the supplier roster.
    pub fn contact_line(&self) -> String {
        [self.contact_person.as_deref(), self.phone.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}
