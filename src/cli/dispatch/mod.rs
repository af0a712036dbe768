use crate::cli::actions::{Action, server::Args};
use crate::otp::{CodeSpace, ConsumeMode, OtpConfig};
use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let in_memory = matches.get_flag("in-memory");
    let dsn = if in_memory {
        None
    } else {
        let dsn = matches
            .get_one::<String>("dsn")
            .cloned()
            .context("missing required argument: --dsn")?;
        Some(SecretString::from(dsn))
    };

    let max_connections = matches
        .get_one::<u32>("max-connections")
        .copied()
        .unwrap_or(5);

    Ok(Action::Server(Args {
        port,
        dsn,
        max_connections,
        otp: otp_config(matches)?,
        delivery_webhook: matches.get_one::<String>("delivery-webhook").cloned(),
    }))
}

fn otp_config(matches: &clap::ArgMatches) -> Result<OtpConfig> {
    let code_ttl = matches.get_one::<u64>("code-ttl").copied().unwrap_or(600);

    let code_space = matches
        .get_one::<String>("code-space")
        .map_or(Ok(CodeSpace::default()), |s| s.parse::<CodeSpace>())
        .map_err(|e| anyhow!(e))?;

    let consume_mode = matches
        .get_one::<String>("consume-mode")
        .map_or(Ok(ConsumeMode::default()), |s| s.parse::<ConsumeMode>())
        .map_err(|e| anyhow!(e))?;

    Ok(OtpConfig::new()
        .with_code_ttl_seconds(code_ttl)
        .with_code_space(code_space)
        .with_consume_mode(consume_mode)
        .with_echo_code(matches.get_flag("echo-code")))
}
