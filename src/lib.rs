//! # TrustGuard OTP service
//!
//! `trustguard` issues and verifies short-lived one-time passcodes (OTPs) used to
//! prove possession of an email address before an account is created or signed in
//! with the external identity provider.
//!
//! ## Life cycle
//!
//! 1. `POST /send-otp` stores a new six digit code for `(email, purpose)` with a
//!    ten minute expiry and hands it to a delivery collaborator.
//! 2. `POST /verify-otp` consumes the newest matching, unused, unexpired code.
//!    A consumed code can never validate again.
//!
//! Rows are never deleted here; expiry is enforced by timestamp comparison and
//! pruning old rows is left to database housekeeping.
//!
//! ## Consumption
//!
//! By default the "mark used" write is a conditional update on `used = false`,
//! so concurrent verifications of the same code serialize and at most one wins.
//! The legacy read-then-write behavior is available with
//! `--consume-mode best-effort`.

pub mod api;
pub mod cli;
pub mod otp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
