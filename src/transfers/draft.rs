//! The client-side transfer draft and its conversion into a submission.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::resolution::LineItemResolver;
use super::row::{LineItem, ResolutionState, RowKind};
use crate::errors::DraftError;
use crate::models::{AssetRef, StockLine, StockRef, SubmissionPayload, UserRef};

/// Working state of a transfer being composed.
#[derive(Debug)]
pub struct TransferDraft {
    from_location_id: i64,
    to_location_id: Option<i64>,
    participants: BTreeSet<i64>,
    rows: LineItemResolver,
}

impl TransferDraft {
    pub fn new(from_location_id: i64) -> Self {
        Self::with_rows(from_location_id, LineItemResolver::new())
    }

    pub fn with_rows(from_location_id: i64, rows: LineItemResolver) -> Self {
        Self {
            from_location_id,
            to_location_id: None,
            participants: BTreeSet::new(),
            rows,
        }
    }

    pub fn from_location_id(&self) -> i64 {
        self.from_location_id
    }

    pub fn to_location_id(&self) -> Option<i64> {
        self.to_location_id
    }

    pub fn set_destination(&mut self, location_id: Option<i64>) {
        self.to_location_id = location_id;
    }

    pub fn participants(&self) -> impl Iterator<Item = i64> + '_ {
        self.participants.iter().copied()
    }

    /// Returns false when the user was already taking part.
    pub fn add_participant(&mut self, user_id: i64) -> bool {
        self.participants.insert(user_id)
    }

    pub fn remove_participant(&mut self, user_id: i64) -> bool {
        self.participants.remove(&user_id)
    }

    pub fn rows(&self) -> &LineItemResolver {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut LineItemResolver {
        &mut self.rows
    }

    /// Validates the draft as a whole and builds the request body.
    ///
    /// `stock_lines` is the stock of the source location as last fetched. Only
    /// the first quantity problem is reported.
    pub fn build_payload(
        &self,
        stock_lines: &[StockLine],
    ) -> Result<SubmissionPayload, DraftError> {
        let to_location_id = self.to_location_id.ok_or(DraftError::MissingDestination)?;
        if to_location_id == self.from_location_id {
            return Err(DraftError::SameLocation);
        }

        let mut assets = Vec::new();
        let mut stocks = Vec::new();
        for row in self.rows.rows() {
            match &row.item {
                LineItem::ItemCode(item) => {
                    if let (ResolutionState::Success, Some(id)) = (item.state, item.resolved_id) {
                        assets.push(AssetRef { id });
                    }
                }
                LineItem::StockLine(stock) => {
                    let Some(stock_id) = stock.resolved_id else {
                        continue;
                    };
                    let line = stock_lines
                        .iter()
                        .find(|line| line.id == stock_id)
                        .ok_or_else(|| DraftError::StockLineUnavailable {
                            label: stock
                                .category_label
                                .clone()
                                .unwrap_or_else(|| format!("#{}", stock_id)),
                        })?;
                    if stock.quantity == 0 {
                        return Err(DraftError::NonPositiveQuantity {
                            label: line.category_label.clone(),
                        });
                    }
                    if stock.quantity > line.available_quantity {
                        return Err(DraftError::QuantityExceeded {
                            label: line.category_label.clone(),
                            max: line.available_quantity,
                        });
                    }
                    stocks.push(StockRef {
                        id: stock_id,
                        quantity: stock.quantity,
                    });
                }
            }
        }

        if assets.is_empty() && stocks.is_empty() {
            return Err(DraftError::EmptyDraft);
        }

        Ok(SubmissionPayload {
            from_location_id: self.from_location_id,
            location_id: to_location_id,
            assets,
            stocks,
            users: self.participants().map(|id| UserRef { id }).collect(),
        })
    }
}

/// One line of the confirmation dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLine {
    pub kind: RowKind,
    pub label: String,
    pub code: Option<String>,
    pub quantity: u32,
}

/// Frozen copy of a draft shown for confirmation.
///
/// Later edits to the draft do not reach a snapshot; confirming submits
/// exactly what was shown.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationSnapshot {
    payload: SubmissionPayload,
    lines: Vec<SnapshotLine>,
    frozen_at: DateTime<Utc>,
}

impl ConfirmationSnapshot {
    pub fn freeze(draft: &TransferDraft, stock_lines: &[StockLine]) -> Result<Self, DraftError> {
        let payload = draft.build_payload(stock_lines)?;
        let lines = draft
            .rows()
            .rows()
            .iter()
            .filter_map(|row| match &row.item {
                LineItem::ItemCode(item) if item.state == ResolutionState::Success => {
                    Some(SnapshotLine {
                        kind: RowKind::ItemCode,
                        label: item.category_label.clone().unwrap_or_default(),
                        code: Some(item.raw_code.trim().to_string()),
                        quantity: 1,
                    })
                }
                LineItem::StockLine(stock) if stock.resolved_id.is_some() => Some(SnapshotLine {
                    kind: RowKind::StockLine,
                    label: stock.category_label.clone().unwrap_or_default(),
                    code: None,
                    quantity: stock.quantity,
                }),
                _ => None,
            })
            .collect();

        Ok(Self {
            payload,
            lines,
            frozen_at: Utc::now(),
        })
    }

    pub fn payload(&self) -> &SubmissionPayload {
        &self.payload
    }

    pub fn lines(&self) -> &[SnapshotLine] {
        &self.lines
    }

    pub fn frozen_at(&self) -> DateTime<Utc> {
        self.frozen_at
    }

    pub fn from_location_id(&self) -> i64 {
        self.payload.from_location_id
    }

    pub fn to_location_id(&self) -> i64 {
        self.payload.location_id
    }
}
