use crate::{
    api,
    otp::{
        CodeDelivery, CodeStore, ConsumeMode, LogDelivery, MemoryCodeStore, OtpConfig, OtpService,
        PgCodeStore, WebhookDelivery,
    },
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{fmt::Write as _, sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    /// `None` keeps codes in process memory.
    pub dsn: Option<SecretString>,
    pub max_connections: u32,
    pub otp: OtpConfig,
    pub delivery_webhook: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the webhook URL is invalid, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = code_store(&args).await?;

    let delivery: Arc<dyn CodeDelivery> = match &args.delivery_webhook {
        Some(url) => Arc::new(WebhookDelivery::new(url)?),
        None => Arc::new(LogDelivery),
    };

    if args.otp.echo_code() {
        warn!("--echo-code is enabled: issued codes are returned to the caller");
    }

    let service = Arc::new(OtpService::new(store, delivery, args.otp));

    api::new(args.port, service).await
}

async fn code_store(args: &Args) -> Result<Arc<dyn CodeStore>> {
    let Some(dsn) = &args.dsn else {
        warn!(
            "Using the in-memory code store: codes are lost on restart and not shared between instances"
        );
        return Ok(Arc::new(MemoryCodeStore::new()));
    };

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(args.max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    info!("Connected to database");

    Ok(Arc::new(PgCodeStore::new(pool)))
}

fn log_startup_args(args: &Args) {
    let store = args
        .dsn
        .as_ref()
        .map_or_else(|| "memory".to_string(), |dsn| redact_dsn(dsn.expose_secret()));
    let consume_mode = match args.otp.consume_mode() {
        ConsumeMode::Strict => "strict",
        ConsumeMode::BestEffort => "best-effort",
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("store", store),
        ("max_connections", args.max_connections.to_string()),
        ("code_ttl", format!("{}s", args.otp.code_ttl().as_secs())),
        ("code_space", format!("{:?}", args.otp.code_space()).to_lowercase()),
        ("consume_mode", consume_mode.to_string()),
        ("echo_code", args.otp.echo_code().to_string()),
        (
            "delivery",
            args.delivery_webhook
                .clone()
                .unwrap_or_else(|| "log".to_string()),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ = write!(message, "\n  {key}:{padding} {value}");
    }
    info!("{message}");
}

fn banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

const BANNER: &str = r"
    .-----.
   / .---. \
  | |     | |
 .-----------.
 |    ___    |
 |   [___]   |  T R U S T G U A R D {VERSION}
 |     |     |
 '-----------'";
