//! Error taxonomy for the issue/verify flows and its HTTP mapping.

use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

pub const GENERATE_REQUIRED: &str = "Email and purpose are required";
pub const VERIFY_REQUIRED: &str = "Email, code, and purpose are required";
pub const UNKNOWN_PURPOSE: &str = "Purpose must be signin or signup";
pub const INVALID_OR_EXPIRED: &str = "Invalid or expired OTP code";

#[derive(Debug, Error)]
pub enum OtpError {
    /// Missing or malformed input the caller can fix.
    #[error("{0}")]
    Validation(&'static str),
    /// No usable record: wrong, expired and already used are indistinguishable.
    #[error("Invalid or expired OTP code")]
    InvalidOrExpiredCode,
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
    #[error("delivery error: {0:#}")]
    Delivery(anyhow::Error),
}

/// Which flow failed; only used to pick the opaque 500 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Generate,
    Verify,
}

/// Map an error to the status and message returned to the caller.
///
/// Storage and delivery causes are logged here and replaced with a fixed message.
pub fn otp_error_response(err: &OtpError, operation: Operation) -> (StatusCode, String) {
    match err {
        OtpError::Validation(message) => (StatusCode::BAD_REQUEST, (*message).to_string()),
        OtpError::InvalidOrExpiredCode => {
            (StatusCode::BAD_REQUEST, INVALID_OR_EXPIRED.to_string())
        }
        OtpError::Storage(cause) => {
            error!("OTP storage failure: {cause:#}");
            let message = match operation {
                Operation::Generate => "Failed to generate OTP",
                Operation::Verify => "Failed to verify OTP",
            };
            (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
        }
        OtpError::Delivery(cause) => {
            error!("OTP delivery failure: {cause:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send OTP".to_string(),
            )
        }
    }
}
