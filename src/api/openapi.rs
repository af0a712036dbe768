#![allow(clippy::needless_for_each)]

use utoipa::OpenApi;

#[allow(unused_imports)]
use super::handlers::{
    health::{__path_health, Health},
    otp::{__path_send_otp, __path_verify_otp},
    types::{ErrorResponse, GenerateResponse, VerifyResponse},
};
use crate::otp::{GenerateRequest, VerifyRequest};

#[derive(OpenApi)]
#[openapi(
    paths(health, send_otp, verify_otp),
    components(
        schemas(
            Health,
            GenerateRequest,
            GenerateResponse,
            VerifyRequest,
            VerifyResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "otp", description = "One-time passcode issue and verification"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = Some(env!("CARGO_PKG_DESCRIPTION").to_string());
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_otp_paths() {
        let doc = openapi();
        assert!(doc.paths.paths.contains_key("/send-otp"));
        assert!(doc.paths.paths.contains_key("/verify-otp"));
        assert!(doc.paths.paths.contains_key("/health"));
        assert_eq!(doc.info.title, "trustguard");
    }

    #[test]
    fn openapi_registers_schemas() {
        let doc = openapi();
        let schemas = doc
            .components
            .map(|components| components.schemas)
            .unwrap_or_default();
        assert!(schemas.contains_key("GenerateRequest"));
        assert!(schemas.contains_key("ErrorResponse"));
    }
}
