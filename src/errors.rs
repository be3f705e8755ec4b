use reqwest::StatusCode;
use serde::Deserialize;
use strum::Display;

use crate::transfers::row::RowId;

/// Error body returned by the PyrHouse API.
///
/// Every field is optional: older endpoints answer with a bare `{"error": "..."}`,
/// newer ones add a machine-readable `code`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ServerErrorBody {
    /// Parses a raw response body, falling back to treating it as plain text.
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<ServerErrorBody>(body) {
            Ok(parsed) => parsed,
            Err(_) if body.trim().is_empty() => Self::default(),
            Err(_) => Self {
                message: Some(body.trim().to_string()),
                ..Self::default()
            },
        }
    }

    /// Best human-readable text carried by the body.
    pub fn text(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_default()
    }

    fn is_same_location(&self) -> bool {
        let code_matches = self
            .code
            .as_deref()
            .map(|code| code.eq_ignore_ascii_case("same_location"))
            .unwrap_or(false);
        code_matches || self.text().to_ascii_lowercase().contains("same location")
    }
}

/// User-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    InvalidData,
    SameLocation,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    ServerError,
    RequestTimeout,
    NetworkError,
    Configuration,
}

/// Errors raised while talking to the PyrHouse API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Source and destination locations must differ")]
    SameLocation,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ServiceError {
    /// Maps a non-success HTTP response to an error.
    /// This is the single source of truth for status-to-error mapping.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed = ServerErrorBody::parse(body);
        let text = parsed.text();
        match status {
            StatusCode::BAD_REQUEST if parsed.is_same_location() => Self::SameLocation,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::InvalidData(text),
            StatusCode::UNAUTHORIZED => Self::Unauthorized(text),
            StatusCode::FORBIDDEN => Self::Forbidden(text),
            StatusCode::NOT_FOUND => Self::NotFound(text),
            StatusCode::CONFLICT => Self::Conflict(text),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Self::RequestTimeout,
            s if s.is_server_error() => Self::ServerError(text),
            s => Self::UnexpectedStatus {
                status: s.as_u16(),
                message: text,
            },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidData(_) | Self::Decode(_) => ErrorCategory::InvalidData,
            Self::SameLocation => ErrorCategory::SameLocation,
            Self::Unauthorized(_) => ErrorCategory::Unauthorized,
            Self::Forbidden(_) => ErrorCategory::Forbidden,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::ServerError(_) | Self::UnexpectedStatus { .. } => ErrorCategory::ServerError,
            Self::RequestTimeout => ErrorCategory::RequestTimeout,
            Self::NetworkError(_) => ErrorCategory::NetworkError,
            Self::InvalidConfiguration(_) => ErrorCategory::Configuration,
        }
    }

    /// Returns the message shown to the operator.
    /// Authorization failures carry the server's reason verbatim; server-side
    /// failures get a generic message instead.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidData(msg) if !msg.is_empty() => {
                format!("The server rejected the transfer: {}", msg)
            }
            Self::InvalidData(_) => "The server rejected the transfer data".to_string(),
            Self::SameLocation => "Source and destination must differ".to_string(),
            Self::Unauthorized(msg) if !msg.is_empty() => format!("Unauthorized: {}", msg),
            Self::Unauthorized(_) => "Your session has expired, please sign in again".to_string(),
            Self::Forbidden(msg) if !msg.is_empty() => format!("Forbidden: {}", msg),
            Self::Forbidden(_) => "You are not allowed to perform this action".to_string(),
            Self::NotFound(_) => {
                "An item of this transfer no longer exists or is not available".to_string()
            }
            Self::Conflict(_) => "The transfer conflicts with a recent change".to_string(),
            Self::ServerError(_) | Self::UnexpectedStatus { .. } | Self::Decode(_) => {
                "The server encountered an error, please try again later".to_string()
            }
            Self::RequestTimeout => "The server did not answer in time".to_string(),
            Self::NetworkError(_) => "Unable to reach the server".to_string(),
            Self::InvalidConfiguration(msg) => format!("Client misconfigured: {}", msg),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::RequestTimeout
        } else if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else if err.is_builder() {
            ServiceError::InvalidConfiguration(err.to_string())
        } else {
            ServiceError::NetworkError(err.to_string())
        }
    }
}

/// Errors raised by row operations of a transfer draft.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("Row {0} does not exist")]
    UnknownRow(RowId),

    #[error("Row {0} is locked")]
    RowLocked(RowId),

    #[error("Row {0} does not hold that kind of line item")]
    WrongKind(RowId),

    #[error("Row {0} failed validation; retype its code first")]
    RowFailed(RowId),

    #[error("Row {0} has no item code to validate")]
    EmptyCode(RowId),

    #[error("Item code {0} is already used in this transfer")]
    DuplicateCode(String),

    #[error("Another item code validation is in progress")]
    ValidationInFlight,

    #[error("Stock line {0} has no available quantity")]
    StockExhausted(i64),

    #[error("Stock line {0} is already selected in this transfer")]
    DuplicateStock(i64),

    #[error("Row {0} has no stock line selected")]
    NoStockSelected(RowId),
}

/// Errors raised when a draft cannot be turned into a submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("Select a destination")]
    MissingDestination,

    #[error("Source and destination must differ")]
    SameLocation,

    #[error("Quantity for {label} must be greater than zero")]
    NonPositiveQuantity { label: String },

    #[error("Quantity for {label} exceeds the available stock (max {max})")]
    QuantityExceeded { label: String, max: u32 },

    #[error("Stock line {label} is no longer available at the source location")]
    StockLineUnavailable { label: String },

    #[error("Add at least one item")]
    EmptyDraft,
}

/// Errors raised by the submission workflow.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Nothing is awaiting confirmation")]
    NotPending,

    #[error("A confirmation is already pending")]
    AlreadyPending,

    #[error("A submission is already in flight")]
    InFlight,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(400, r#"{"error":"bad payload"}"#, ErrorCategory::InvalidData)]
    #[case(422, r#"{"message":"quantity exceeds stock"}"#, ErrorCategory::InvalidData)]
    #[case(400, r#"{"code":"SAME_LOCATION"}"#, ErrorCategory::SameLocation)]
    #[case(400, "cannot transfer to the same location", ErrorCategory::SameLocation)]
    #[case(401, "", ErrorCategory::Unauthorized)]
    #[case(403, r#"{"error":"forbidden"}"#, ErrorCategory::Forbidden)]
    #[case(404, r#"{"error":"asset not found"}"#, ErrorCategory::NotFound)]
    #[case(409, "", ErrorCategory::Conflict)]
    #[case(500, "boom", ErrorCategory::ServerError)]
    #[case(503, "", ErrorCategory::ServerError)]
    #[case(504, "", ErrorCategory::RequestTimeout)]
    #[case(418, "", ErrorCategory::ServerError)]
    fn maps_status_to_category(
        #[case] status: u16,
        #[case] body: &str,
        #[case] expected: ErrorCategory,
    ) {
        let status = StatusCode::from_u16(status).unwrap();
        assert_eq!(ServiceError::from_response(status, body).category(), expected);
    }

    #[test]
    fn keeps_server_message_for_invalid_data() {
        let err = ServiceError::from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error":"Unprocessable","message":"quantity exceeds stock"}"#,
        );
        assert_eq!(err, ServiceError::InvalidData("quantity exceeds stock".into()));
        assert!(err.user_message().contains("quantity exceeds stock"));
    }

    #[rstest]
    #[case(401, r#"{"error":"token revoked"}"#, "Unauthorized: token revoked")]
    #[case(401, "", "Your session has expired, please sign in again")]
    #[case(
        403,
        r#"{"error":"role warehouse cannot move assets"}"#,
        "Forbidden: role warehouse cannot move assets"
    )]
    #[case(403, "", "You are not allowed to perform this action")]
    fn authorization_failures_keep_server_reason(
        #[case] status: u16,
        #[case] body: &str,
        #[case] expected: &str,
    ) {
        let status = StatusCode::from_u16(status).unwrap();
        assert_eq!(ServiceError::from_response(status, body).user_message(), expected);
    }

    #[test]
    fn server_errors_do_not_leak_details() {
        let err = ServiceError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "stack trace");
        assert!(!err.user_message().contains("stack trace"));
    }

    #[test]
    fn category_renders_snake_case() {
        assert_eq!(ErrorCategory::RequestTimeout.to_string(), "request_timeout");
    }
}
