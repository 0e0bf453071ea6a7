pub mod comparison;
pub mod kpi;
pub mod matrix;
pub mod price;
pub mod price_list;
pub mod quantity;
pub mod sort;
pub mod variance;

pub use comparison::{assemble_report, ComparisonQuery, ComparisonReport, ComparisonRow, ComparisonTarget};
pub use kpi::{summarize, KpiSummary};
pub use matrix::{
    build_matrix, ComparisonMatrix, ComparisonMode, MatrixCell, MatrixOptions, MatrixRow,
    PriceCell, QuotationSnapshot, SupplierColumn, TieBreak,
};
pub use price::{resolve_price, with_vat, PriceSource, ResolvedPrice};
pub use price_list::{project_price_list, PriceListSummary, TeamPriceList};
pub use quantity::{QuantityResolver, QuantityTier, ResolvedQuantity};
pub use sort::{SortDirection, SortKey, SortSpec};
pub use variance::{calculate_variance, baseline_from_variance, PreviousPriceBook, RowVariance, Variance};
