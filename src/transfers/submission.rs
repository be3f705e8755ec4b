//! Confirm-then-submit workflow for a transfer draft.

use std::mem;
use std::time::Duration;
use tracing::{error, info, instrument};

use super::draft::{ConfirmationSnapshot, TransferDraft};
use crate::catalog::CatalogApi;
use crate::config::ClientConfig;
use crate::errors::{ServiceError, SubmissionError};
use crate::models::{StockLine, TransferReceipt};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    Idle,
    /// A snapshot is frozen and shown for confirmation.
    ConfirmPending(ConfirmationSnapshot),
    Submitting,
    Submitted(TransferReceipt),
}

/// Where the client goes after a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    TransferDetail { id: i64 },
}

impl Navigation {
    pub fn route(&self) -> String {
        match self {
            Navigation::TransferDetail { id } => format!("/transfers/{}", id),
        }
    }
}

#[derive(Debug)]
pub struct SubmissionCoordinator {
    state: SubmissionState,
    last_error: Option<ServiceError>,
    submit_timeout: Duration,
}

impl SubmissionCoordinator {
    pub fn new(submit_timeout: Duration) -> Self {
        Self {
            state: SubmissionState::Idle,
            last_error: None,
            submit_timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.submit_timeout())
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn snapshot(&self) -> Option<&ConfirmationSnapshot> {
        match &self.state {
            SubmissionState::ConfirmPending(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Error of the last failed submission, kept until the next attempt.
    pub fn last_error(&self) -> Option<&ServiceError> {
        self.last_error.as_ref()
    }

    /// The submit control is disabled while a submission is in flight.
    pub fn can_submit(&self) -> bool {
        !matches!(self.state, SubmissionState::Submitting)
    }

    /// Validates the draft and freezes it for confirmation.
    pub fn request_confirmation(
        &mut self,
        draft: &TransferDraft,
        stock_lines: &[StockLine],
    ) -> Result<&ConfirmationSnapshot, SubmissionError> {
        match self.state {
            SubmissionState::ConfirmPending(_) => return Err(SubmissionError::AlreadyPending),
            SubmissionState::Submitting => return Err(SubmissionError::InFlight),
            SubmissionState::Idle | SubmissionState::Submitted(_) => {}
        }

        let snapshot = ConfirmationSnapshot::freeze(draft, stock_lines)?;
        self.last_error = None;
        self.state = SubmissionState::ConfirmPending(snapshot);
        match &self.state {
            SubmissionState::ConfirmPending(snapshot) => Ok(snapshot),
            _ => Err(SubmissionError::NotPending),
        }
    }

    /// Drops the pending snapshot. The draft itself is untouched.
    pub fn cancel(&mut self) -> Option<ConfirmationSnapshot> {
        match mem::replace(&mut self.state, SubmissionState::Idle) {
            SubmissionState::ConfirmPending(snapshot) => Some(snapshot),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Submits the pending snapshot.
    ///
    /// On failure the coordinator returns to idle with the error recorded so
    /// the user can correct the draft and try again.
    #[instrument(skip(self, catalog))]
    pub async fn confirm<C>(&mut self, catalog: &C) -> Result<Navigation, SubmissionError>
    where
        C: CatalogApi + ?Sized,
    {
        let snapshot = match mem::replace(&mut self.state, SubmissionState::Submitting) {
            SubmissionState::ConfirmPending(snapshot) => snapshot,
            SubmissionState::Submitting => return Err(SubmissionError::InFlight),
            other => {
                self.state = other;
                return Err(SubmissionError::NotPending);
            }
        };

        info!(
            from = snapshot.from_location_id(),
            to = snapshot.to_location_id(),
            lines = snapshot.lines().len(),
            "Submitting transfer"
        );
        let result = tokio::time::timeout(
            self.submit_timeout,
            catalog.submit_transfer(snapshot.payload()),
        )
        .await
        .unwrap_or(Err(ServiceError::RequestTimeout));

        match result {
            Ok(receipt) => {
                let navigation = Navigation::TransferDetail { id: receipt.id };
                info!(transfer_id = receipt.id, "Transfer created");
                self.state = SubmissionState::Submitted(receipt);
                Ok(navigation)
            }
            Err(err) => {
                error!(category = %err.category(), error = %err, "Transfer submission failed");
                self.last_error = Some(err.clone());
                self.state = SubmissionState::Idle;
                Err(err.into())
            }
        }
    }
}
