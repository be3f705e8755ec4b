//! Per-row resolution of transfer line items.
//!
//! Item-code rows are validated against the server one at a time: a draft-wide
//! permit is taken before the lookup and released when the [`PendingValidation`]
//! holding it is dropped, whichever way the lookup ends. Results are applied to
//! rows by [`RowId`], so removing or editing a row while its lookup is in flight
//! simply discards the answer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::duplicate_guard::{is_duplicate_code, is_duplicate_stock, same_code};
use super::row::{
    LineItem, ResolutionState, RowFailure, RowId, RowKind, StockLineRow, TransferRow,
};
use crate::catalog::CatalogApi;
use crate::errors::{RowError, ServiceError};
use crate::models::{ItemCodeLookup, StockLine};

struct ValidationPermit {
    flag: Arc<AtomicBool>,
}

impl ValidationPermit {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for ValidationPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// An item-code lookup that has been started but not applied yet.
///
/// Holds the draft's validation permit; dropping it without calling
/// [`LineItemResolver::complete_validation`] abandons the lookup.
pub struct PendingValidation {
    row_id: RowId,
    code: String,
    _permit: ValidationPermit,
}

impl PendingValidation {
    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Result of applying a resolution to a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Resolved {
        row_id: RowId,
        resolved_id: i64,
        category: String,
        /// Row appended because the resolved row was the last one.
        grown: Option<RowId>,
    },
    Failed {
        row_id: RowId,
        reason: RowFailure,
    },
    /// The row vanished or changed while its lookup was in flight.
    Discarded { row_id: RowId },
}

/// Owns the rows of a transfer draft and drives their resolution.
#[derive(Debug)]
pub struct LineItemResolver {
    rows: Vec<TransferRow>,
    focused: Option<RowId>,
    validation_flag: Arc<AtomicBool>,
}

impl Default for LineItemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LineItemResolver {
    /// Starts with a single empty item-code row, focused.
    pub fn new() -> Self {
        let first = TransferRow::empty(RowKind::ItemCode);
        Self {
            focused: Some(first.id()),
            rows: vec![first],
            validation_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Restores a draft from existing rows; an empty trailing row is added if missing.
    pub fn from_rows(rows: Vec<TransferRow>) -> Self {
        let mut resolver = Self {
            rows,
            focused: None,
            validation_flag: Arc::new(AtomicBool::new(false)),
        };
        let trailing = resolver.ensure_trailing_row();
        resolver.focused = Some(trailing);
        resolver
    }

    pub fn rows(&self) -> &[TransferRow] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&TransferRow> {
        self.rows.iter().find(|row| row.id() == id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn focused(&self) -> Option<RowId> {
        self.focused
    }

    pub fn focus(&mut self, id: RowId) -> Result<(), RowError> {
        self.index_of(id)?;
        self.focused = Some(id);
        Ok(())
    }

    /// True while an item-code lookup holds the validation permit.
    pub fn is_validating(&self) -> bool {
        self.validation_flag.load(Ordering::Acquire)
    }

    /// Item codes currently resolved in the draft.
    pub fn resolved_codes(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.item_code())
            .filter(|code| code.state == ResolutionState::Success)
            .map(|code| code.raw_code.as_str())
            .collect()
    }

    /// Stock lines that may still be chosen for `for_row`.
    pub fn selectable_stock_lines<'a>(
        &self,
        lines: &'a [StockLine],
        for_row: Option<RowId>,
    ) -> Vec<&'a StockLine> {
        lines
            .iter()
            .filter(|line| line.is_selectable())
            .filter(|line| !is_duplicate_stock(&self.rows, line.id, for_row))
            .collect()
    }

    /// Adds a row of `kind`, reusing the trailing empty row when there is one.
    pub fn add_row(&mut self, kind: RowKind) -> RowId {
        if let Some(last) = self.rows.last_mut() {
            if last.is_empty() {
                if last.item.kind() != kind {
                    last.item = LineItem::empty(kind);
                }
                let id = last.id();
                self.focused = Some(id);
                return id;
            }
        }
        self.grow(kind)
    }

    pub fn remove_row(&mut self, id: RowId) -> Result<(), RowError> {
        let index = self.index_of(id)?;
        self.rows.remove(index);
        debug!(row = %id, index, "Removed transfer row");

        self.ensure_trailing_row();
        let trailing = self.collapse_empty_tail();
        if self.focused == Some(id) {
            self.focused = Some(trailing);
        }
        Ok(())
    }

    /// Switches the kind of an unlocked row, clearing its fields.
    pub fn change_kind(&mut self, id: RowId, kind: RowKind) -> Result<(), RowError> {
        let row = self.unlocked_row_mut(id)?;
        if row.item.kind() != kind {
            row.item = LineItem::empty(kind);
        }
        self.collapse_empty_tail();
        Ok(())
    }

    /// Replaces the code typed into an item-code row.
    ///
    /// A failed row becomes unresolved again so it can be retried. Clearing
    /// the row just above the trailing empty row merges the two.
    pub fn set_code(&mut self, id: RowId, code: impl Into<String>) -> Result<(), RowError> {
        let row = self.unlocked_row_mut(id)?;
        match &mut row.item {
            LineItem::ItemCode(item) => {
                item.raw_code = code.into();
                item.resolved_id = None;
                item.category_label = None;
                item.state = ResolutionState::Unresolved;
                item.failure = None;
            }
            LineItem::StockLine(_) => return Err(RowError::WrongKind(id)),
        }
        self.collapse_empty_tail();
        Ok(())
    }

    /// Starts validating the code of an item-code row.
    ///
    /// A code already resolved elsewhere in the draft fails the row right away.
    /// A failed row must be retyped before it is validated again. While
    /// another lookup is in flight the request is dropped with
    /// [`RowError::ValidationInFlight`].
    pub fn begin_validation(&mut self, id: RowId) -> Result<PendingValidation, RowError> {
        let index = self.index_of(id)?;
        let row = &self.rows[index];
        if row.is_locked() {
            return Err(RowError::RowLocked(id));
        }
        if row.item.state() == ResolutionState::Failure {
            return Err(RowError::RowFailed(id));
        }
        let code = row
            .item_code()
            .ok_or(RowError::WrongKind(id))?
            .raw_code
            .trim()
            .to_string();
        if code.is_empty() {
            return Err(RowError::EmptyCode(id));
        }

        if is_duplicate_code(&self.rows, &code, Some(id)) {
            warn!(row = %id, code = %code, "Item code already used in this transfer");
            if let LineItem::ItemCode(item) = &mut self.rows[index].item {
                item.fail(RowFailure::Duplicate);
            }
            return Err(RowError::DuplicateCode(code));
        }

        let permit = ValidationPermit::acquire(&self.validation_flag).ok_or_else(|| {
            debug!(row = %id, "Validation already in flight, dropping request");
            RowError::ValidationInFlight
        })?;

        Ok(PendingValidation {
            row_id: id,
            code,
            _permit: permit,
        })
    }

    /// Applies the server's answer to the row the lookup was started for.
    pub fn complete_validation(
        &mut self,
        pending: PendingValidation,
        result: Result<ItemCodeLookup, ServiceError>,
    ) -> RowOutcome {
        let row_id = pending.row_id;
        let Some(index) = self.rows.iter().position(|row| row.id() == row_id) else {
            debug!(row = %row_id, "Row removed during validation, discarding result");
            return RowOutcome::Discarded { row_id };
        };

        let still_current = matches!(
            &self.rows[index].item,
            LineItem::ItemCode(item)
                if item.state == ResolutionState::Unresolved
                    && same_code(&item.raw_code, &pending.code)
        );
        if !still_current {
            debug!(row = %row_id, "Row changed during validation, discarding result");
            return RowOutcome::Discarded { row_id };
        }

        // search results may be stale, so the guard is checked again
        let duplicate = is_duplicate_code(&self.rows, &pending.code, Some(row_id));
        let LineItem::ItemCode(item) = &mut self.rows[index].item else {
            return RowOutcome::Discarded { row_id };
        };

        match result {
            Ok(_) if duplicate => {
                warn!(row = %row_id, code = %pending.code, "Item code resolved twice, rejecting");
                item.fail(RowFailure::Duplicate);
                RowOutcome::Failed {
                    row_id,
                    reason: RowFailure::Duplicate,
                }
            }
            Ok(lookup) => {
                info!(
                    row = %row_id,
                    code = %pending.code,
                    asset_id = lookup.id,
                    "Item code resolved"
                );
                item.resolve(lookup.id, lookup.category.clone());
                let grown = (index + 1 == self.rows.len()).then(|| self.grow(RowKind::ItemCode));
                RowOutcome::Resolved {
                    row_id,
                    resolved_id: lookup.id,
                    category: lookup.category,
                    grown,
                }
            }
            Err(ServiceError::NotFound(_)) => {
                warn!(row = %row_id, code = %pending.code, "Item code not found or unavailable");
                item.fail(RowFailure::NotFound);
                RowOutcome::Failed {
                    row_id,
                    reason: RowFailure::NotFound,
                }
            }
            Err(err) => {
                warn!(row = %row_id, code = %pending.code, error = %err, "Item code lookup failed");
                let reason = RowFailure::Lookup(err.category());
                item.fail(reason.clone());
                RowOutcome::Failed { row_id, reason }
            }
        }
    }

    /// Validates the code of row `id` against the catalog.
    #[instrument(skip(self, catalog))]
    pub async fn resolve_item_code<C>(
        &mut self,
        id: RowId,
        catalog: &C,
    ) -> Result<RowOutcome, RowError>
    where
        C: CatalogApi + ?Sized,
    {
        let pending = self.begin_validation(id)?;
        let result = catalog.validate_item_code(pending.code()).await;
        Ok(self.complete_validation(pending, result))
    }

    /// Points a stock row at `line`.
    ///
    /// Exhausted lines and lines already used by another row are refused. A new
    /// selection starts at quantity 1; a reselection keeps the previous quantity
    /// clamped to the new line.
    pub fn select_stock_line(
        &mut self,
        id: RowId,
        line: &StockLine,
    ) -> Result<RowOutcome, RowError> {
        let index = self.index_of(id)?;
        let previous = match &self.rows[index].item {
            LineItem::StockLine(stock) => stock.quantity,
            LineItem::ItemCode(_) => return Err(RowError::WrongKind(id)),
        };
        if !line.is_selectable() {
            return Err(RowError::StockExhausted(line.id));
        }
        if is_duplicate_stock(&self.rows, line.id, Some(id)) {
            return Err(RowError::DuplicateStock(line.id));
        }

        let mut selected = StockLineRow::selected(line, 1);
        if previous > 0 {
            selected.quantity = selected.clamp_quantity(i64::from(previous));
        }
        self.rows[index].item = LineItem::StockLine(selected);
        debug!(row = %id, stock_id = line.id, "Stock line selected");

        let grown = (index + 1 == self.rows.len()).then(|| self.grow(RowKind::ItemCode));
        Ok(RowOutcome::Resolved {
            row_id: id,
            resolved_id: line.id,
            category: line.display_label(),
            grown,
        })
    }

    /// Stores a quantity for a stock row, clamped to what was available at selection.
    pub fn set_quantity(&mut self, id: RowId, requested: i64) -> Result<u32, RowError> {
        let index = self.index_of(id)?;
        let LineItem::StockLine(stock) = &mut self.rows[index].item else {
            return Err(RowError::WrongKind(id));
        };
        if stock.resolved_id.is_none() {
            return Err(RowError::NoStockSelected(id));
        }
        stock.quantity = stock.clamp_quantity(requested);
        Ok(stock.quantity)
    }

    fn index_of(&self, id: RowId) -> Result<usize, RowError> {
        self.rows
            .iter()
            .position(|row| row.id() == id)
            .ok_or(RowError::UnknownRow(id))
    }

    fn unlocked_row_mut(&mut self, id: RowId) -> Result<&mut TransferRow, RowError> {
        let index = self.index_of(id)?;
        let row = &mut self.rows[index];
        if row.is_locked() {
            return Err(RowError::RowLocked(id));
        }
        Ok(row)
    }

    fn push_row(&mut self, kind: RowKind) -> RowId {
        let row = TransferRow::empty(kind);
        let id = row.id();
        self.rows.push(row);
        id
    }

    /// Appends a row and moves focus to it.
    fn grow(&mut self, kind: RowKind) -> RowId {
        let id = self.push_row(kind);
        self.focused = Some(id);
        id
    }

    /// Makes sure the draft ends with an empty row and returns its id.
    fn ensure_trailing_row(&mut self) -> RowId {
        match self.rows.last() {
            Some(last) if last.is_empty() => last.id(),
            _ => self.push_row(RowKind::ItemCode),
        }
    }

    /// Drops empty rows stacked at the end so at most one remains, and
    /// returns the id of the last row.
    fn collapse_empty_tail(&mut self) -> RowId {
        while self.rows.len() > 1 && self.rows[self.rows.len() - 2].is_empty() {
            let Some(last) = self.rows.last() else {
                break;
            };
            if !last.is_empty() {
                break;
            }
            let dropped = last.id();
            self.rows.pop();
            debug!(row = %dropped, "Merged duplicate empty trailing row");
            if self.focused == Some(dropped) {
                self.focused = self.rows.last().map(TransferRow::id);
            }
        }
        match self.rows.last() {
            Some(last) => last.id(),
            None => self.push_row(RowKind::ItemCode),
        }
    }
}
