pub mod health;
pub use self::health::health;

pub mod otp;
pub use self::otp::{preflight, send_otp, verify_otp};

pub mod types;

// axum handler for /
pub async fn root() -> String {
    format!(
        "{} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        crate::GIT_COMMIT_HASH
    )
}
