//! Code Generator and Code Verifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

use super::{
    CodeLookup, ConsumeMode, OtpConfig, OtpRecord, Purpose,
    code::{generate_code, well_formed},
    delivery::{CodeDelivery, DeliveryMessage},
    error::{GENERATE_REQUIRED, OtpError, UNKNOWN_PURPOSE, VERIFY_REQUIRED},
    store::CodeStore,
};

#[derive(ToSchema, Serialize, Deserialize, Debug, Default, Clone)]
pub struct GenerateRequest {
    #[serde(default)]
    pub email: Option<String>,
    /// `signin` or `signup`
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default, Clone)]
pub struct VerifyRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    /// `signin` or `signup`
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Result of a successful issue.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

// Blank counts as missing.
fn required(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.trim().is_empty())
}

fn parse_purpose(value: &str) -> Result<Purpose, OtpError> {
    value
        .parse::<Purpose>()
        .map_err(|_| OtpError::Validation(UNKNOWN_PURPOSE))
}

pub struct OtpService {
    store: Arc<dyn CodeStore>,
    delivery: Arc<dyn CodeDelivery>,
    config: OtpConfig,
}

impl OtpService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CodeStore>,
        delivery: Arc<dyn CodeDelivery>,
        config: OtpConfig,
    ) -> Self {
        Self {
            store,
            delivery,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CodeStore> {
        &self.store
    }

    /// Issue a new code for `(email, purpose)`.
    ///
    /// # Errors
    /// `Validation` for missing fields or an unknown purpose, `Storage` when the
    /// row cannot be written, `Delivery` when the collaborator rejects the code.
    pub async fn issue(&self, request: &GenerateRequest) -> Result<IssuedCode, OtpError> {
        self.issue_at(request, Utc::now()).await
    }

    /// Same as [`Self::issue`] with an explicit clock reading.
    ///
    /// # Errors
    /// See [`Self::issue`].
    #[instrument(skip(self, request), fields(purpose = ?request.purpose))]
    pub async fn issue_at(
        &self,
        request: &GenerateRequest,
        now: DateTime<Utc>,
    ) -> Result<IssuedCode, OtpError> {
        let (Some(email), Some(purpose)) = (
            required(request.email.as_ref()),
            required(request.purpose.as_ref()),
        ) else {
            return Err(OtpError::Validation(GENERATE_REQUIRED));
        };
        let purpose = parse_purpose(purpose)?;

        let code = generate_code(self.config.code_space());
        let record = OtpRecord::issue(
            email.to_string(),
            code,
            purpose,
            now,
            self.config.code_ttl(),
        );

        self.store.insert(&record).await.map_err(OtpError::Storage)?;

        debug!(id = %record.id, expires_at = %record.expires_at, "OTP code stored");

        let message = DeliveryMessage {
            email: record.email,
            code: record.code,
            purpose,
            expires_at: record.expires_at,
        };
        self.delivery
            .deliver(&message)
            .await
            .map_err(OtpError::Delivery)?;

        Ok(IssuedCode {
            code: message.code,
            expires_at: message.expires_at,
        })
    }

    /// Verify and consume a code.
    ///
    /// # Errors
    /// `Validation` for missing fields, `InvalidOrExpiredCode` when no usable
    /// record matches (an unknown purpose or a malformed code never does),
    /// `Storage` when the lookup itself fails.
    pub async fn verify(&self, request: &VerifyRequest) -> Result<(), OtpError> {
        self.verify_at(request, Utc::now()).await
    }

    /// Same as [`Self::verify`] with an explicit clock reading.
    ///
    /// # Errors
    /// See [`Self::verify`].
    #[instrument(skip(self, request), fields(purpose = ?request.purpose))]
    pub async fn verify_at(
        &self,
        request: &VerifyRequest,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let (Some(email), Some(code), Some(purpose)) = (
            required(request.email.as_ref()),
            required(request.code.as_ref()),
            required(request.purpose.as_ref()),
        ) else {
            return Err(OtpError::Validation(VERIFY_REQUIRED));
        };

        // No row can carry an unknown purpose or a malformed code.
        let Ok(purpose) = purpose.parse::<Purpose>() else {
            return Err(OtpError::InvalidOrExpiredCode);
        };
        if !well_formed(code) {
            return Err(OtpError::InvalidOrExpiredCode);
        }

        let lookup = CodeLookup {
            email,
            code,
            purpose,
        };

        match self.config.consume_mode() {
            ConsumeMode::Strict => {
                let consumed = self
                    .store
                    .consume(lookup, now)
                    .await
                    .map_err(OtpError::Storage)?;
                let id = consumed.ok_or(OtpError::InvalidOrExpiredCode)?;
                debug!(%id, "OTP code consumed");
            }
            ConsumeMode::BestEffort => {
                let record = self
                    .store
                    .find_usable(lookup, now)
                    .await
                    .map_err(OtpError::Storage)?
                    .ok_or(OtpError::InvalidOrExpiredCode)?;

                if let Err(err) = self.store.mark_used(record.id).await {
                    // Possession was already proven; the row stays reusable until expiry.
                    warn!(id = %record.id, "Failed to mark OTP code used: {err:#}");
                } else {
                    debug!(id = %record.id, "OTP code marked used");
                }
            }
        }

        Ok(())
    }
}
