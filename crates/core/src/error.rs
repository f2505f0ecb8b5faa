//! Wire error model.

use serde::Serialize;

/// Contract implemented by every permgate error enum.
///
/// `status_code` follows HTTP conventions: 400 malformed input, 401
/// authentication failure, 403 authorization failure, 500 configuration or
/// internal error. `error_code` is a stable numeric identifier per distinct
/// failure cause, intended for machine matching independent of message text.
pub trait CodedError: std::error::Error {
    fn status_code(&self) -> u16;

    fn error_code(&self) -> u32;

    /// Wire-ready body for this error.
    fn to_body(&self) -> ErrorBody {
        ErrorBody {
            message: self.to_string(),
            status_code: self.status_code(),
            error_code: self.error_code(),
        }
    }
}

/// Serializable error payload: `{message, statusCode, errorCode}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub status_code: u16,
    pub error_code: u32,
}
