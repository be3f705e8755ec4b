//! Prevents one serialized item from being shipped twice in a draft.

use super::row::{ResolutionState, RowId, TransferRow};

/// Item codes compare trimmed and ASCII case-insensitively.
pub fn same_code(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Returns true when `candidate` is already resolved by a row other than `exclude`.
pub fn is_duplicate_code<'a, I>(rows: I, candidate: &str, exclude: Option<RowId>) -> bool
where
    I: IntoIterator<Item = &'a TransferRow>,
{
    rows.into_iter()
        .filter(|row| Some(row.id()) != exclude)
        .filter_map(|row| row.item_code())
        .any(|code| code.state == ResolutionState::Success && same_code(&code.raw_code, candidate))
}

/// Returns true when stock line `stock_id` is selected by a row other than `exclude`.
pub fn is_duplicate_stock<'a, I>(rows: I, stock_id: i64, exclude: Option<RowId>) -> bool
where
    I: IntoIterator<Item = &'a TransferRow>,
{
    rows.into_iter()
        .filter(|row| Some(row.id()) != exclude)
        .filter_map(|row| row.stock_line())
        .any(|stock| stock.resolved_id == Some(stock_id))
}
