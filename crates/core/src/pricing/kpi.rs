use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::matrix::{ComparisonMatrix, MatrixRow};
use crate::pricing::variance::{calculate_variance, RowVariance, Variance};

/// Overview figures for one comparison. Aggregate variances are `None` when no
/// row had data for that baseline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub total_products: usize,
    pub total_suppliers: usize,
    pub priced_products: usize,
    pub products_with_previous: usize,
    pub total_current_value: Decimal,
    pub vs_base_price: Option<Variance>,
    pub vs_previous_period: Option<Variance>,
    pub vs_base_demand: Option<Variance>,
}

impl KpiSummary {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct CostPair {
    current: Decimal,
    baseline: Decimal,
    rows: usize,
}

impl CostPair {
    fn add(&mut self, current: Decimal, baseline: Decimal) {
        self.current += current;
        self.baseline += baseline;
        self.rows += 1;
    }

    fn variance(&self) -> Option<Variance> {
        if self.rows == 0 {
            return None;
        }
        calculate_variance(self.current, self.baseline)
    }
}

/// Cost-weighted rollup: each baseline compares summed costs, not an average of
/// row percentages. `variances` is aligned with `matrix.rows`.
pub fn summarize(matrix: &ComparisonMatrix, variances: &[RowVariance]) -> KpiSummary {
    let mut total_current_value = Decimal::ZERO;
    let mut priced_products = 0;
    let mut products_with_previous = 0;
    let mut base_price = CostPair::default();
    let mut previous_period = CostPair::default();
    let mut base_demand = CostPair::default();

    for (row, variance) in matrix.rows.iter().zip(variances) {
        let Some(reference_total) = reference_total(row, variance) else {
            continue;
        };
        priced_products += 1;
        if variance.has_previous() {
            products_with_previous += 1;
        }

        let Some(quantity) = row.quantity.as_ref().map(|resolved| resolved.quantity) else {
            continue;
        };
        total_current_value += reference_total * quantity;

        if let Some(base) = &variance.vs_base_price {
            base_price.add(base.current * quantity, base.baseline * quantity);
        }
        if let Some(previous) = &variance.vs_previous_period {
            previous_period.add(previous.current * quantity, previous.baseline * quantity);
        }
        if let Some(demand) = &variance.vs_base_demand {
            base_demand.add(demand.current, demand.baseline);
        }
    }

    KpiSummary {
        total_products: matrix.rows.len(),
        total_suppliers: matrix.suppliers.len(),
        priced_products,
        products_with_previous,
        total_current_value,
        vs_base_price: base_price.variance(),
        vs_previous_period: previous_period.variance(),
        vs_base_demand: base_demand.variance(),
    }
}

fn reference_total(row: &MatrixRow, variance: &RowVariance) -> Option<Decimal> {
    variance
        .reference_supplier
        .as_ref()
        .and_then(|supplier| row.cell(supplier))
        .and_then(|cell| cell.total())
}
