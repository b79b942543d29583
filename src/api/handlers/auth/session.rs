//! Bearer token handling and session teardown.
//!
//! Sessions are minted and revoked by the identity provider. This module only
//! pulls the token out of the `Authorization` header and forwards revocation.

use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{error, instrument};

use crate::api::response::ApiResponse;
use crate::provider::ProviderError;

use super::principal::require_user;
use super::state::AuthState;

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session revoked", body = ApiResponse),
        (status = 400, description = "Provider refused to revoke the session", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 500, description = "Provider unreachable", body = ApiResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(headers, auth_state))]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_user(&headers, auth_state.provider()).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match auth_state.provider().sign_out(&principal.access_token).await {
        Ok(()) => ApiResponse::ok(2005, StatusCode::OK, "Logout successful"),
        Err(ProviderError::Rejected(message)) => {
            error!("Provider rejected logout: {message}");
            ApiResponse::validation(1005, message)
        }
        Err(ProviderError::Unavailable(err)) => {
            error!("Logout failed: {err}");
            ApiResponse::server_error(5005, "Server error during logout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn extract_bearer_token_reads_both_spellings() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer abc")),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_bearer_token(&headers_with("bearer abc")),
            Some("abc".to_string())
        );
    }

    #[test]
    fn extract_bearer_token_rejects_other_schemes_and_empty_tokens() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
        assert_eq!(extract_bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(extract_bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(extract_bearer_token(&headers_with("abc")), None);
    }
}
