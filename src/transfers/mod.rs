//! Transfer composition: line-item rows, their resolution, draft aggregation
//! and the confirm-then-submit workflow.

pub mod draft;
pub mod duplicate_guard;
pub mod resolution;
pub mod row;
pub mod search;
pub mod submission;

pub use draft::{ConfirmationSnapshot, SnapshotLine, TransferDraft};
pub use resolution::{LineItemResolver, PendingValidation, RowOutcome};
pub use row::{
    ItemCodeRow, LineItem, ResolutionState, RowFailure, RowId, RowKind, StockLineRow, TransferRow,
};
pub use search::{SearchCoordinator, SearchOutcome, SearchRequest};
pub use submission::{Navigation, SubmissionCoordinator, SubmissionState};
