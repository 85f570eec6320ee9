use axum::{
    body::Body,
    extract::{connect_info::ConnectInfo, rejection::JsonRejection, FromRequest, FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
    Json,
};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::ApiError;
use crate::utils::i18n::detect_locale;
use crate::utils::security::log_security_event;
use crate::AppState;

pub const SESSION_HEADER: &str = "x-session-id";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Inserted into request extensions once the session and CSRF token check out.
#[derive(Clone, Debug)]
pub struct VerifiedSession {
    pub session_id: String,
}

fn header<'a>(request: &'a Request<Body>, name: &str) -> Option<&'a str> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Guards state-changing routes: the session must exist and be unexpired,
/// and the CSRF token must be the one issued with it.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user_agent = header(&request, "user-agent").unwrap_or("").to_string();
    let path = request.uri().path().to_string();

    let session_id = header(&request, SESSION_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Missing session".to_string()))?
        .to_string();

    if !state.sessions.validate_session(&session_id) {
        tracing::debug!("Rejected unknown or expired session on {}", path);
        return Err(ApiError::Unauthorized("Session expired, please reload the page".to_string()));
    }

    let csrf_token = header(&request, CSRF_HEADER).unwrap_or("");
    if !state.sessions.verify_csrf(&session_id, csrf_token) {
        log_security_event(
            "csrf_token_mismatch",
            json!({ "method": request.method().as_str() }),
            &user_agent,
            &path,
        );
        return Err(ApiError::Forbidden("Invalid CSRF token".to_string()));
    }

    request.extensions_mut().insert(VerifiedSession { session_id });
    Ok(next.run(request).await)
}

/// Stable per-client key for throttling: first `X-Forwarded-For` hop, then the
/// peer address.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientIdentity(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded {
            return Ok(ClientIdentity(ip.to_string()));
        }
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientIdentity(addr.ip().to_string()));
        }
        tracing::warn!("Unable to determine client IP");
        Ok(ClientIdentity("unknown".to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Locale(pub &'static str);

impl<S: Send + Sync> FromRequestParts<S> for Locale {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Locale(detect_locale(&parts.headers)))
    }
}

/// `Json` body extractor whose rejections render as `ApiError`, so malformed
/// bodies get the same `{"error": ..}` shape as every other failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let path = request.uri().path().to_string();
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                tracing::debug!("Rejected request body on {}: {}", path, rejection.body_text());
                Err(rejection.into())
            }
        }
    }
}
