use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::pricing::comparison::ComparisonRow;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    ProductCode,
    ProductName,
    Category,
    BestTotal,
    VarianceBasePct,
    VariancePreviousPct,
    Quantity,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

type Comparator = fn(&ComparisonRow, &ComparisonRow, SortDirection) -> Ordering;

impl SortKey {
    pub const ALL: [SortKey; 7] = [
        Self::ProductCode,
        Self::ProductName,
        Self::Category,
        Self::BestTotal,
        Self::VarianceBasePct,
        Self::VariancePreviousPct,
        Self::Quantity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductCode => "product_code",
            Self::ProductName => "product_name",
            Self::Category => "category",
            Self::BestTotal => "best_total",
            Self::VarianceBasePct => "variance_base_pct",
            Self::VariancePreviousPct => "variance_previous_pct",
            Self::Quantity => "quantity",
        }
    }

    fn comparator(&self) -> Comparator {
        match self {
            Self::ProductCode => by_product_code,
            Self::ProductName => by_product_name,
            Self::Category => by_category,
            Self::BestTotal => by_best_total,
            Self::VarianceBasePct => by_variance_base,
            Self::VariancePreviousPct => by_variance_previous,
            Self::Quantity => by_quantity,
        }
    }
}

fn by_product_code(a: &ComparisonRow, b: &ComparisonRow, dir: SortDirection) -> Ordering {
    dir.apply(a.row.product.code.cmp(&b.row.product.code))
}

fn by_product_name(a: &ComparisonRow, b: &ComparisonRow, dir: SortDirection) -> Ordering {
    dir.apply(a.row.product.name.to_lowercase().cmp(&b.row.product.name.to_lowercase()))
}

fn by_category(a: &ComparisonRow, b: &ComparisonRow, dir: SortDirection) -> Ordering {
    missing_last(a.row.product.category.as_ref(), b.row.product.category.as_ref(), dir)
}

fn by_best_total(a: &ComparisonRow, b: &ComparisonRow, dir: SortDirection) -> Ordering {
    missing_last(a.row.best_total, b.row.best_total, dir)
}

fn by_variance_base(a: &ComparisonRow, b: &ComparisonRow, dir: SortDirection) -> Ordering {
    missing_last(
        a.variance.vs_base_price.as_ref().map(|variance| variance.percent),
        b.variance.vs_base_price.as_ref().map(|variance| variance.percent),
        dir,
    )
}

fn by_variance_previous(a: &ComparisonRow, b: &ComparisonRow, dir: SortDirection) -> Ordering {
    missing_last(
        a.variance.vs_previous_period.as_ref().map(|variance| variance.percent),
        b.variance.vs_previous_period.as_ref().map(|variance| variance.percent),
        dir,
    )
}

fn by_quantity(a: &ComparisonRow, b: &ComparisonRow, dir: SortDirection) -> Ordering {
    missing_last(
        a.row.quantity.as_ref().map(|resolved| resolved.quantity),
        b.row.quantity.as_ref().map(|resolved| resolved.quantity),
        dir,
    )
}

/// Rows without a value sort after rows with one, whatever the direction.
fn missing_last<T: Ord>(left: Option<T>, right: Option<T>, direction: SortDirection) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => direction.apply(left.cmp(&right)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|key| key.as_str() == wanted).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(SortKey::as_str).collect();
            DomainError::validation(
                "sort",
                format!("unknown sort key `{value}` (expected one of {})", known.join("|")),
            )
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self { key: SortKey::ProductCode, direction: SortDirection::Asc }
    }
}

impl FromStr for SortSpec {
    type Err = DomainError;

    /// `key` or `key:asc|desc`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (key, direction) = match value.split_once(':') {
            Some((key, direction)) => (key, Some(direction)),
            None => (value, None),
        };
        let direction = match direction.map(|d| d.trim().to_ascii_lowercase()) {
            None => SortDirection::Asc,
            Some(d) if d == "asc" => SortDirection::Asc,
            Some(d) if d == "desc" => SortDirection::Desc,
            Some(other) => {
                return Err(DomainError::validation(
                    "sort",
                    format!("unknown sort direction `{other}` (expected asc|desc)"),
                ))
            }
        };
        Ok(Self { key: key.parse()?, direction })
    }
}

/// Stable sort; equal keys fall back to product code ascending.
pub fn sort_rows(rows: &mut [ComparisonRow], spec: SortSpec) {
    let comparator = spec.key.comparator();
    rows.sort_by(|left, right| {
        comparator(left, right, spec.direction)
            .then_with(|| left.row.product.code.cmp(&right.row.product.code))
    });
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{sort_rows, SortDirection, SortKey, SortSpec};
    use crate::domain::quotation::QuotationStatus;
    use crate::errors::DomainError;
    use crate::pricing::comparison::ComparisonRow;
    use crate::pricing::matrix::fixtures::{line, product, snapshot};
    use crate::pricing::matrix::{build_matrix, MatrixOptions};
    use crate::pricing::quantity::QuantityResolver;
    use crate::pricing::variance::RowVariance;

    fn rows() -> Vec<ComparisonRow> {
        let snapshots = vec![snapshot(
            "S1",
            QuotationStatus::Pending,
            vec![line("A", Some(30)), line("B", None), line("C", Some(10))],
        )];
        let products = vec![product("A", "Dry"), product("B", "Dry"), product("C", "Dry")];
        build_matrix(&snapshots, &products, &QuantityResolver::without_demand(), &MatrixOptions::default())
            .rows
            .into_iter()
            .map(|row| ComparisonRow { row, variance: RowVariance::default() })
            .collect()
    }

    fn codes(rows: &[ComparisonRow]) -> Vec<&str> {
        rows.iter().map(|row| row.row.product.code.as_str()).collect()
    }

    #[test]
    fn every_key_round_trips_through_its_name() {
        for key in SortKey::ALL {
            assert_eq!(key.as_str().parse::<SortKey>().expect("known key"), key);
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = "supplier_mood".parse::<SortKey>().expect_err("unknown");
        assert!(matches!(error, DomainError::Validation { ref field, .. } if field == "sort"));
        assert!("best_total:sideways".parse::<SortSpec>().is_err());
    }

    #[test]
    fn parses_direction_suffix() {
        let spec: SortSpec = "best_total:desc".parse().expect("spec");
        assert_eq!(spec.key, SortKey::BestTotal);
        assert_eq!(spec.direction, SortDirection::Desc);
        assert_eq!("quantity".parse::<SortSpec>().expect("spec").direction, SortDirection::Asc);
    }

    #[test]
    fn unpriced_rows_sort_last_in_both_directions() {
        let mut sorted = rows();
        sort_rows(&mut sorted, SortSpec { key: SortKey::BestTotal, direction: SortDirection::Asc });
        assert_eq!(codes(&sorted), vec!["C", "A", "B"]);

        sort_rows(&mut sorted, SortSpec { key: SortKey::BestTotal, direction: SortDirection::Desc });
        assert_eq!(codes(&sorted), vec!["A", "C", "B"]);
        assert_eq!(sorted[0].row.best_total, Some(Decimal::from(30)));
    }
}
