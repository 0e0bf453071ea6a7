use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Quotation cycle key. A calendar date used as an opaque identifier, never as a range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Period(NaiveDate);

impl Period {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Compact `YYYYMM` form used in generated quotation codes.
    pub fn month_key(&self) -> String {
        format!("{:04}{:02}", self.0.year(), self.0.month())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for Period {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(value.trim(), Self::FORMAT).map(Self).map_err(|_| {
            DomainError::validation("period", format!("`{value}` is not a YYYY-MM-DD date"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Period;
    use crate::errors::DomainError;

    #[test]
    fn parses_iso_dates_and_renders_them_back() {
        let period: Period = "2024-01-01".parse().expect("valid period");
        assert_eq!(period.to_string(), "2024-01-01");
        assert_eq!(period.month_key(), "202401");
    }

    #[test]
    fn rejects_other_date_layouts() {
        let error = "01/02/2024".parse::<Period>().expect_err("not iso");
        assert!(matches!(error, DomainError::Validation { ref field, .. } if field == "period"));
    }

    #[test]
    fn periods_order_chronologically() {
        let jan: Period = "2024-01-01".parse().expect("jan");
        let feb: Period = "2024-02-01".parse().expect("feb");
        assert!(jan < feb);
    }
}
