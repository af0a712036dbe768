//! One-time passcode domain: records, configuration, storage and the
//! issue/verify service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod code;
pub mod delivery;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod service;
pub mod store;

pub use code::{CodeSpace, generate_code};
pub use delivery::{CodeDelivery, DeliveryMessage, LogDelivery, WebhookDelivery};
pub use error::{Operation, OtpError, otp_error_response};
pub use memory::MemoryCodeStore;
pub use postgres::PgCodeStore;
pub use service::{GenerateRequest, IssuedCode, OtpService, VerifyRequest};
pub use store::CodeStore;

const DEFAULT_CODE_TTL_SECONDS: u64 = 10 * 60;

/// Flow a code is scoped to; a signup code never validates a signin attempt.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Signin,
    Signup,
}

impl Purpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signin => "signin",
            Self::Signup => "signup",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "signin" => Ok(Self::Signin),
            "signup" => Ok(Self::Signup),
            other => Err(format!("unknown purpose: {other}")),
        }
    }
}

/// One issued code as persisted in the Code Store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub id: Uuid,
    pub email: String,
    pub code: String,
    pub purpose: Purpose,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    /// Build a fresh, unused record issued at `now`.
    #[must_use]
    pub fn issue(
        email: String,
        code: String,
        purpose: Purpose,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            id: Uuid::now_v7(),
            email,
            code,
            purpose,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            used: false,
            created_at: now,
        }
    }

    /// A record can still be consumed iff it is unused and `now` is before expiry.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }

    #[must_use]
    pub fn matches(&self, lookup: &CodeLookup<'_>) -> bool {
        self.email == lookup.email && self.code == lookup.code && self.purpose == lookup.purpose
    }
}

/// Exact-match key the verifier searches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLookup<'a> {
    pub email: &'a str,
    pub code: &'a str,
    pub purpose: Purpose,
}

/// How the verifier flips the `used` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsumeMode {
    /// Conditional update on `used = false`; losing the race fails verification.
    #[default]
    Strict,
    /// Read, then mark used; a failed write is logged and the check still passes.
    BestEffort,
}

impl FromStr for ConsumeMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "best-effort" | "best_effort" => Ok(Self::BestEffort),
            other => Err(format!("unknown consume mode: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct OtpConfig {
    code_ttl: Duration,
    code_space: CodeSpace,
    consume_mode: ConsumeMode,
    echo_code: bool,
}

impl OtpConfig {
    /// Default config: 10 minute codes from the legacy 100000-999999 space,
    /// strict consumption, codes never echoed to the caller.
    #[must_use]
    pub fn new() -> Self {
        Self {
            code_ttl: Duration::from_secs(DEFAULT_CODE_TTL_SECONDS),
            code_space: CodeSpace::default(),
            consume_mode: ConsumeMode::default(),
            echo_code: false,
        }
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: u64) -> Self {
        self.code_ttl = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn with_code_space(mut self, code_space: CodeSpace) -> Self {
        self.code_space = code_space;
        self
    }

    #[must_use]
    pub fn with_consume_mode(mut self, consume_mode: ConsumeMode) -> Self {
        self.consume_mode = consume_mode;
        self
    }

    #[must_use]
    pub fn with_echo_code(mut self, echo_code: bool) -> Self {
        self.echo_code = echo_code;
        self
    }

    #[must_use]
    pub fn code_ttl(&self) -> Duration {
        self.code_ttl
    }

    #[must_use]
    pub fn code_space(&self) -> CodeSpace {
        self.code_space
    }

    #[must_use]
    pub fn consume_mode(&self) -> ConsumeMode {
        self.consume_mode
    }

    #[must_use]
    pub fn echo_code(&self) -> bool {
        self.echo_code
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::TimeZone;

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    #[test]
    fn purpose_parses_only_known_tags() {
        assert_eq!("signin".parse::<Purpose>(), Ok(Purpose::Signin));
        assert_eq!("signup".parse::<Purpose>(), Ok(Purpose::Signup));
        assert!("SIGNUP".parse::<Purpose>().is_err());
        assert!("reset".parse::<Purpose>().is_err());
    }

    #[test]
    fn purpose_serializes_lowercase() -> Result<()> {
        assert_eq!(serde_json::to_value(Purpose::Signup)?, "signup");
        Ok(())
    }

    #[test]
    fn issued_record_expires_after_ttl() {
        let now = issued_at();
        let record = OtpRecord::issue(
            "a@b.com".to_string(),
            "482913".to_string(),
            Purpose::Signup,
            now,
            Duration::from_secs(600),
        );
        assert!(!record.used);
        assert_eq!(record.created_at, now);
        assert_eq!(record.expires_at - now, chrono::Duration::minutes(10));
    }

    #[test]
    fn record_is_unusable_at_expiry_or_when_used() {
        let now = issued_at();
        let mut record = OtpRecord::issue(
            "a@b.com".to_string(),
            "482913".to_string(),
            Purpose::Signup,
            now,
            Duration::from_secs(600),
        );
        assert!(record.is_usable(now));
        assert!(!record.is_usable(record.expires_at));

        record.used = true;
        assert!(!record.is_usable(now));
    }

    #[test]
    fn record_matches_exact_triple_only() {
        let record = OtpRecord::issue(
            "a@b.com".to_string(),
            "482913".to_string(),
            Purpose::Signup,
            issued_at(),
            Duration::from_secs(600),
        );
        let lookup = CodeLookup {
            email: "a@b.com",
            code: "482913",
            purpose: Purpose::Signup,
        };
        assert!(record.matches(&lookup));
        assert!(!record.matches(&CodeLookup {
            purpose: Purpose::Signin,
            ..lookup
        }));
        assert!(!record.matches(&CodeLookup {
            email: "A@b.com",
            ..lookup
        }));
    }

    #[test]
    fn consume_mode_parses_cli_values() {
        assert_eq!("strict".parse::<ConsumeMode>(), Ok(ConsumeMode::Strict));
        assert_eq!(
            "best-effort".parse::<ConsumeMode>(),
            Ok(ConsumeMode::BestEffort)
        );
        assert!("sometimes".parse::<ConsumeMode>().is_err());
    }

    #[test]
    fn config_defaults() {
        let config = OtpConfig::default();
        assert_eq!(config.code_ttl(), Duration::from_secs(600));
        assert_eq!(config.code_space(), CodeSpace::Legacy);
        assert_eq!(config.consume_mode(), ConsumeMode::Strict);
        assert!(!config.echo_code());
    }

    #[test]
    fn config_never_allows_zero_ttl() {
        let config = OtpConfig::new().with_code_ttl_seconds(0);
        assert_eq!(config.code_ttl(), Duration::from_secs(1));
    }
}
