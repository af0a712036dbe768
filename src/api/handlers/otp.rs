//! OTP issue and verify endpoints.

use axum::{
    Json,
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::types::{ErrorResponse, GenerateResponse, VerifyResponse};
use crate::otp::{
    GenerateRequest, Operation, OtpError, OtpService, VerifyRequest, otp_error_response,
};

// Bodies are JSON whatever the Content-Type says; anything unparsable has no fields.
fn json_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|err| {
        debug!("Request body is not JSON: {err}");
        Value::Null
    })
}

// A present non-string value (e.g. `"code": 482913`) is read as its JSON text.
fn text_field(body: &Value, name: &str) -> Option<String> {
    match body.get(name)? {
        Value::Null => None,
        Value::String(value) => Some(value.clone()),
        other => Some(other.to_string()),
    }
}

fn generate_request(body: &Bytes) -> GenerateRequest {
    let body = json_body(body);
    GenerateRequest {
        email: text_field(&body, "email"),
        purpose: text_field(&body, "purpose"),
    }
}

fn verify_request(body: &Bytes) -> VerifyRequest {
    let body = json_body(body);
    VerifyRequest {
        email: text_field(&body, "email"),
        code: text_field(&body, "code"),
        purpose: text_field(&body, "purpose"),
    }
}

fn error_response(err: &OtpError, operation: Operation) -> Response {
    let (status, message) = otp_error_response(err, operation);
    (status, Json(ErrorResponse { error: message })).into_response()
}

fn no_store() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers
}

/// Issue a six digit code for an email and purpose.
#[utoipa::path(
    post,
    path = "/send-otp",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Code issued", body = GenerateResponse),
        (status = 400, description = "Missing email or purpose", body = ErrorResponse),
        (status = 500, description = "Code could not be stored or sent", body = ErrorResponse)
    ),
    tag = "otp"
)]
#[instrument(skip(service, body))]
pub async fn send_otp(Extension(service): Extension<Arc<OtpService>>, body: Bytes) -> Response {
    let request = generate_request(&body);

    match service.issue(&request).await {
        Ok(issued) => {
            let body = GenerateResponse {
                success: true,
                message: "OTP sent successfully".to_string(),
                otp: service.config().echo_code().then_some(issued.code),
            };
            (StatusCode::OK, no_store(), Json(body)).into_response()
        }
        Err(err) => error_response(&err, Operation::Generate),
    }
}

/// Verify and consume a code.
#[utoipa::path(
    post,
    path = "/verify-otp",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Code verified", body = VerifyResponse),
        (status = 400, description = "Missing fields or invalid code", body = ErrorResponse),
        (status = 500, description = "Code store failure", body = ErrorResponse)
    ),
    tag = "otp"
)]
#[instrument(skip(service, body))]
pub async fn verify_otp(
    Extension(service): Extension<Arc<OtpService>>,
    body: Bytes,
) -> Response {
    let request = verify_request(&body);

    match service.verify(&request).await {
        Ok(()) => {
            let body = VerifyResponse {
                success: true,
                message: "OTP verified successfully".to_string(),
            };
            (StatusCode::OK, no_store(), Json(body)).into_response()
        }
        Err(err) => error_response(&err, Operation::Verify),
    }
}

/// Bare `OPTIONS` answer; CORS headers are added by the router layer.
pub async fn preflight() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::{LogDelivery, MemoryCodeStore, OtpConfig};
    use anyhow::{Context, Result};
    use axum::body::to_bytes;
    use serde::Serialize;

    fn service(config: OtpConfig) -> Arc<OtpService> {
        Arc::new(OtpService::new(
            Arc::new(MemoryCodeStore::new()),
            Arc::new(LogDelivery),
            config,
        ))
    }

    fn bytes<T: Serialize>(request: &T) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(request)?))
    }

    async fn body_json(response: Response) -> Result<Value> {
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    #[test]
    fn body_fields_are_read_leniently() {
        let request = verify_request(&Bytes::from_static(
            br#"{"email":"a@b.com","code":482913,"purpose":null}"#,
        ));
        assert_eq!(request.email.as_deref(), Some("a@b.com"));
        assert_eq!(request.code.as_deref(), Some("482913"));
        assert!(request.purpose.is_none());

        let request = generate_request(&Bytes::from_static(b"email=a@b.com"));
        assert!(request.email.is_none());
        assert!(request.purpose.is_none());

        let request = generate_request(&Bytes::from_static(b"[1,2]"));
        assert!(request.email.is_none());
    }

    #[tokio::test]
    async fn send_otp_missing_payload() -> Result<()> {
        let service = service(OtpConfig::default());
        let response = send_otp(Extension(service), Bytes::new()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await?;
        assert_eq!(body["error"], "Email and purpose are required");
        Ok(())
    }

    #[tokio::test]
    async fn send_otp_hides_code_by_default() -> Result<()> {
        let request = GenerateRequest {
            email: Some("a@b.com".to_string()),
            purpose: Some("signup".to_string()),
        };
        let service = service(OtpConfig::default());
        let response = send_otp(Extension(service), bytes(&request)?).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );
        let body = body_json(response).await?;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "OTP sent successfully");
        assert!(body.get("otp").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn send_then_verify_in_demo_mode() -> Result<()> {
        let service = service(OtpConfig::default().with_echo_code(true));
        let request = GenerateRequest {
            email: Some("a@b.com".to_string()),
            purpose: Some("signin".to_string()),
        };
        let response = send_otp(Extension(service.clone()), bytes(&request)?).await;
        let body = body_json(response).await?;
        let code = body["otp"].as_str().context("missing otp")?.to_string();

        let verify = VerifyRequest {
            email: Some("a@b.com".to_string()),
            code: Some(code),
            purpose: Some("signin".to_string()),
        };
        let response = verify_otp(Extension(service.clone()), bytes(&verify)?).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert_eq!(body["message"], "OTP verified successfully");

        let response = verify_otp(Extension(service), bytes(&verify)?).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await?;
        assert_eq!(body["error"], "Invalid or expired OTP code");
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_missing_fields() -> Result<()> {
        let verify = VerifyRequest {
            email: Some("a@b.com".to_string()),
            code: Some(String::new()),
            purpose: Some("signup".to_string()),
        };
        let service = service(OtpConfig::default());
        let response = verify_otp(Extension(service), bytes(&verify)?).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await?;
        assert_eq!(body["error"], "Email, code, and purpose are required");
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_unknown_purpose_is_invalid_code() -> Result<()> {
        let service = service(OtpConfig::default());
        let body = Bytes::from_static(br#"{"email":"a@b.com","code":"123456","purpose":"reset"}"#);
        let response = verify_otp(Extension(service), body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await?;
        assert_eq!(body["error"], "Invalid or expired OTP code");
        Ok(())
    }

    #[tokio::test]
    async fn preflight_is_empty_ok() -> Result<()> {
        let response = preflight().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert!(body.is_empty());
        Ok(())
    }
}
