//! Email verification endpoints, backed by the provider.
//!
//! The verification link lands here as a GET with the token in the query, so
//! mail clients that prefetch links hit an idempotent endpoint.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, instrument};

use crate::api::response::ApiResponse;
use crate::provider::ProviderError;

use super::state::AuthState;
use super::types::{ResendVerificationRequest, VerifyEmailQuery};
use super::utils::normalize_email;

#[utoipa::path(
    get,
    path = "/api/auth/verify-email",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = ApiResponse),
        (status = 400, description = "Missing, invalid or expired token", body = ApiResponse),
        (status = 500, description = "Provider unreachable", body = ApiResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, query))]
pub async fn verify_email(
    auth_state: Extension<Arc<AuthState>>,
    query: Query<VerifyEmailQuery>,
) -> impl IntoResponse {
    let token = query.0.token.filter(|token| !token.is_empty());
    let Some(token) = token else {
        return ApiResponse::validation(1003, "Verification token is required");
    };

    match auth_state.provider().verify_email_token(&token).await {
        Ok(()) => ApiResponse::ok(2003, StatusCode::OK, "Email verified successfully"),
        Err(ProviderError::Rejected(message)) => ApiResponse::validation(4005, message),
        Err(ProviderError::Unavailable(err)) => {
            error!("Email verification failed: {err}");
            ApiResponse::server_error(5003, "Server error during email verification")
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Verification email sent", body = ApiResponse),
        (status = 400, description = "Missing email or provider refusal", body = ApiResponse),
        (status = 500, description = "Provider unreachable", body = ApiResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn resend_verification(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResendVerificationRequest>>,
) -> impl IntoResponse {
    let email = payload
        .and_then(|Json(request)| request.email)
        .map(|email| normalize_email(&email))
        .filter(|email| !email.is_empty());
    let Some(email) = email else {
        return ApiResponse::validation(1004, "Email is required");
    };

    match auth_state.provider().resend_verification(&email).await {
        Ok(()) => ApiResponse::ok(2004, StatusCode::OK, "Verification email has been resent"),
        Err(ProviderError::Rejected(message)) => ApiResponse::validation(4006, message),
        Err(ProviderError::Unavailable(err)) => {
            error!("Failed to resend verification email: {err}");
            ApiResponse::server_error(5004, "Server error during resend verification")
        }
    }
}
