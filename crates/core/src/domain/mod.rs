pub mod period;
pub mod price_history;
pub mod product;
pub mod quotation;
pub mod supplier;
pub mod team;

/// Codes are compared case-insensitively and stored upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Match key for free-text regions and categories: trimmed and lower-cased with
/// full Unicode folding. Storage keeps the same form in its `*_key` columns.
pub fn fold_key(value: &str) -> String {
    value.trim().to_lowercase()
}
