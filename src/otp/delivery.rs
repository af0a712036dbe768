//! Delivery collaborators for issued codes.
//!
//! The service never sends mail itself. It hands each code to a `CodeDelivery`
//! implementation which decides how the recipient gets it:
//!
//! - `LogDelivery` logs the message and returns `Ok(())`. This is the local
//!   dev/demo default.
//! - `WebhookDelivery` POSTs the message as JSON to an external mailer/SMS
//!   bridge and fails on any non-2xx answer.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::{future::Future, pin::Pin};
use tracing::{debug, info};
use url::Url;

use super::Purpose;
use crate::APP_USER_AGENT;

pub type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

#[derive(Serialize, Clone, Debug)]
pub struct DeliveryMessage {
    pub email: String,
    pub code: String,
    pub purpose: Purpose,
    pub expires_at: DateTime<Utc>,
}

pub trait CodeDelivery: Send + Sync {
    /// Deliver a code or return an error so the caller can report the failure.
    fn deliver<'a>(&'a self, message: &'a DeliveryMessage) -> DeliveryFuture<'a>;
}

#[derive(Clone, Debug)]
pub struct LogDelivery;

impl CodeDelivery for LogDelivery {
    fn deliver<'a>(&'a self, message: &'a DeliveryMessage) -> DeliveryFuture<'a> {
        Box::pin(async move {
            info!(
                email = %message.email,
                purpose = %message.purpose,
                code = %message.code,
                expires_at = %message.expires_at,
                "OTP delivery stub"
            );
            Ok(())
        })
    }
}

#[derive(Clone, Debug)]
pub struct WebhookDelivery {
    client: Client,
    url: Url,
}

impl WebhookDelivery {
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).context("invalid delivery webhook URL")?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("delivery webhook must be http or https, got {}", url.scheme());
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build delivery HTTP client")?;

        Ok(Self { client, url })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl CodeDelivery for WebhookDelivery {
    fn deliver<'a>(&'a self, message: &'a DeliveryMessage) -> DeliveryFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url.clone())
                .json(message)
                .send()
                .await
                .context("delivery webhook request failed")?;

            let status = response.status();
            if !status.is_success() {
                bail!("delivery webhook returned {status}");
            }

            debug!(email = %message.email, "OTP handed to delivery webhook");
            Ok(())
        })
    }
}
