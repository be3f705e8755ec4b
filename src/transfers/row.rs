use std::fmt;
use strum::Display;
use uuid::Uuid;

use crate::errors::ErrorCategory;
use crate::models::StockLine;

/// Stable identity of a row, assigned at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(Uuid);

impl RowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RowKind {
    ItemCode,
    StockLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum ResolutionState {
    #[default]
    Unresolved,
    Success,
    Failure,
}

/// Why a row ended up in [`ResolutionState::Failure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFailure {
    /// The server does not know the code or it cannot be transferred.
    NotFound,
    /// The code is already resolved in another row.
    Duplicate,
    /// The lookup itself failed.
    Lookup(ErrorCategory),
}

/// A serialized asset addressed by its item code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCodeRow {
    pub raw_code: String,
    pub resolved_id: Option<i64>,
    pub category_label: Option<String>,
    pub state: ResolutionState,
    pub failure: Option<RowFailure>,
}

impl ItemCodeRow {
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            raw_code: code.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state == ResolutionState::Unresolved && self.raw_code.trim().is_empty()
    }

    pub(crate) fn resolve(&mut self, id: i64, category: String) {
        self.resolved_id = Some(id);
        self.category_label = Some(category);
        self.state = ResolutionState::Success;
        self.failure = None;
    }

    pub(crate) fn fail(&mut self, reason: RowFailure) {
        self.resolved_id = None;
        self.category_label = None;
        self.state = ResolutionState::Failure;
        self.failure = Some(reason);
    }
}

/// A quantity of bulk stock taken from one stock line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockLineRow {
    /// Selected stock line.
    pub resolved_id: Option<i64>,
    pub category_label: Option<String>,
    /// On-hand quantity recorded when the stock line was selected.
    pub available_quantity: u32,
    pub quantity: u32,
    pub state: ResolutionState,
}

impl StockLineRow {
    /// Builds a row for `line` with the requested quantity as-is.
    pub fn selected(line: &StockLine, quantity: u32) -> Self {
        Self {
            resolved_id: Some(line.id),
            category_label: Some(line.display_label()),
            available_quantity: line.available_quantity,
            quantity,
            state: ResolutionState::Success,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state == ResolutionState::Unresolved && self.resolved_id.is_none()
    }

    /// Clamps a user-entered quantity to `[1, available_quantity]`.
    pub fn clamp_quantity(&self, requested: i64) -> u32 {
        let max = i64::from(self.available_quantity.max(1));
        // bounded by a u32 above
        requested.clamp(1, max) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItem {
    ItemCode(ItemCodeRow),
    StockLine(StockLineRow),
}

impl LineItem {
    pub fn empty(kind: RowKind) -> Self {
        match kind {
            RowKind::ItemCode => LineItem::ItemCode(ItemCodeRow::default()),
            RowKind::StockLine => LineItem::StockLine(StockLineRow::default()),
        }
    }

    pub fn kind(&self) -> RowKind {
        match self {
            LineItem::ItemCode(_) => RowKind::ItemCode,
            LineItem::StockLine(_) => RowKind::StockLine,
        }
    }

    pub fn state(&self) -> ResolutionState {
        match self {
            LineItem::ItemCode(row) => row.state,
            LineItem::StockLine(row) => row.state,
        }
    }

    pub fn resolved_id(&self) -> Option<i64> {
        match self {
            LineItem::ItemCode(row) => row.resolved_id,
            LineItem::StockLine(row) => row.resolved_id,
        }
    }

    pub fn category_label(&self) -> Option<&str> {
        match self {
            LineItem::ItemCode(row) => row.category_label.as_deref(),
            LineItem::StockLine(row) => row.category_label.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            LineItem::ItemCode(row) => row.is_empty(),
            LineItem::StockLine(row) => row.is_empty(),
        }
    }
}

/// One line of a transfer draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRow {
    id: RowId,
    pub item: LineItem,
}

impl TransferRow {
    pub fn new(item: LineItem) -> Self {
        Self {
            id: RowId::new(),
            item,
        }
    }

    pub fn empty(kind: RowKind) -> Self {
        Self::new(LineItem::empty(kind))
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    /// Resolved rows keep their kind and identity for the rest of the draft.
    pub fn is_locked(&self) -> bool {
        self.item.state() == ResolutionState::Success
    }

    pub fn is_empty(&self) -> bool {
        self.item.is_empty()
    }

    pub fn item_code(&self) -> Option<&ItemCodeRow> {
        match &self.item {
            LineItem::ItemCode(row) => Some(row),
            LineItem::StockLine(_) => None,
        }
    }

    pub fn stock_line(&self) -> Option<&StockLineRow> {
        match &self.item {
            LineItem::StockLine(row) => Some(row),
            LineItem::ItemCode(_) => None,
        }
    }
}
