//! HTTP request handlers for the roast endpoint.
//!
//! Precondition failures are answered with an `{"error": ...}` body. Once
//! the preconditions hold, the adapter always produces a 200.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router as AxumRouter,
};
use bateman_runtime::{EvaluationAdapter, EvaluationRequest, EvaluationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Request field carrying the resume.
pub const RESUME_FIELD: &str = "resumeText";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// `None` when the provider credential is missing
    pub adapter: Option<Arc<EvaluationAdapter>>,
    /// Configured provider type
    pub provider: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub provider: String,
    pub credential_configured: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Boundary errors; everything else resolves to a result.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Invalid JSON body")]
    InvalidBody,

    #[error("resumeText is required")]
    MissingResumeText,

    #[error("GEMINI_API_KEY is not configured")]
    CredentialMissing,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::InvalidBody | AppError::MissingResumeText => StatusCode::BAD_REQUEST,
            AppError::CredentialMissing => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        let mut response = (status, body).into_response();
        if status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST, OPTIONS"));
        }
        response
    }
}

/// `/roast` - answers preflight, evaluates POST, rejects the rest.
async fn roast(
    State(state): State<AppState>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    if method == Method::OPTIONS {
        return preflight();
    }

    let outcome = match body {
        Ok(body) => evaluate(&state, &method, &body).await,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "failed to read roast request body");
            Err(AppError::InvalidBody)
        }
    };

    match outcome {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            tracing::info!(error = %e, method = %method, "rejected roast request");
            e.into_response()
        }
    }
}

async fn evaluate(
    state: &AppState,
    method: &Method,
    body: &[u8],
) -> Result<EvaluationResult, AppError> {
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let request = parse_request(body)?;

    let adapter = state.adapter.as_ref().ok_or(AppError::CredentialMissing)?;
    Ok(adapter.evaluate(&request).await)
}

/// Parse the body into a request. An empty body reads as `{}`.
fn parse_request(body: &[u8]) -> Result<EvaluationRequest, AppError> {
    let payload: JsonValue = if body.iter().all(u8::is_ascii_whitespace) {
        JsonValue::Object(Default::default())
    } else {
        serde_json::from_slice(body).map_err(|_| AppError::InvalidBody)?
    };

    let text = payload
        .get(RESUME_FIELD)
        .and_then(JsonValue::as_str)
        .ok_or(AppError::MissingResumeText)?;

    EvaluationRequest::new(text).map_err(|_| AppError::MissingResumeText)
}

fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
    )
        .into_response()
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let status = match &state.adapter {
        Some(adapter) if adapter.is_healthy().await => "healthy",
        _ => "degraded",
    };

    Json(HealthCheckResponse {
        status: status.to_string(),
        provider: state.provider.clone(),
        credential_configured: state.adapter.is_some(),
    })
}

async fn allow_any_origin(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

/// Create the axum router with all routes
///
/// Resume length is not capped, so axum's default body limit is lifted.
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/roast", any(roast))
        .route("/.netlify/functions/roast", any(roast))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::map_response(allow_any_origin))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt; // for oneshot

    fn unconfigured_state() -> AppState {
        AppState {
            adapter: None,
            provider: "gemini".to_string(),
        }
    }

    async fn send(method: &str, uri: &str, body: &'static str) -> Response {
        let app = create_router(unconfigured_state());
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        app.oneshot(request).await.unwrap()
    }

    async fn error_of(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice::<ErrorResponse>(&body).unwrap().error
    }

    #[tokio::test]
    async fn test_preflight_without_credential() {
        let response = send("OPTIONS", "/roast", "").await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let response = send("GET", "/roast", "").await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(error_of(response).await, "Method Not Allowed");
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let response = send("POST", "/roast", "{not json").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(response).await, "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_missing_resume_text() {
        for body in ["", "{}", r#"{"resumeText": 42}"#, r#"{"resumeText": "  \n "}"#, "[]"] {
            let response = send("POST", "/roast", body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(error_of(response).await, "resumeText is required");
        }
    }

    #[tokio::test]
    async fn test_missing_credential_checked_last() {
        let response = send("POST", "/.netlify/functions/roast", r#"{"resumeText": "VP, Pierce & Pierce"}"#).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(error_of(response).await, "GEMINI_API_KEY is not configured");
    }

    #[tokio::test]
    async fn test_body_checked_before_credential() {
        let response = send("POST", "/roast", "{bad").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(response).await, "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_resume_over_default_body_limit() {
        let resume = "Synergy. ".repeat(3 * 1024 * 1024 / 9 + 1);
        let body = serde_json::json!({ "resumeText": resume }).to_string();
        assert!(body.len() > 3 * 1024 * 1024);

        let request = Request::builder()
            .method("POST")
            .uri("/roast")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = create_router(unconfigured_state())
            .oneshot(request)
            .await
            .unwrap();

        // Past the body stage: only the missing credential stops it.
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_of(response).await, "GEMINI_API_KEY is not configured");
    }

    #[tokio::test]
    async fn test_health_reports_missing_credential() {
        let response = send("GET", "/health", "").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthCheckResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "degraded");
        assert_eq!(health.provider, "gemini");
        assert!(!health.credential_configured);
    }

    #[test]
    fn test_parse_request_ignores_extra_fields() {
        let request = parse_request(br#"{"resumeText": "Analyst", "theme": "bone"}"#).unwrap();
        assert_eq!(request.text(), "Analyst");
    }
}
