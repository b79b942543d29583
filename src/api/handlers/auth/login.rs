//! Password login and the dedicated code login.
//!
//! Accounts with an active second factor cannot complete the standard login:
//! the provider session is discarded and the client is pointed at the code
//! login, which re-verifies the password and checks the current code in one
//! call. An advisory policy can be configured instead, which hands out the
//! session and only flags the account in `meta`.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, instrument, warn};

use crate::api::response::ApiResponse;
use crate::provider::{ProviderError, ProviderSession, ProviderUser, SignInOutcome};
use crate::store::SecondFactorState;

use super::state::{AuthState, SecondFactorPolicy};
use super::types::{LoginRequest, TotpLoginRequest};
use super::utils::normalize_email;

/// Verify credentials with the provider and fold every failure into its
/// envelope. Also enforces the email-verified gate.
async fn verify_credentials(
    auth_state: &AuthState,
    email: &str,
    password: &str,
) -> Result<(ProviderUser, ProviderSession), ApiResponse> {
    let requested_expiry = Some(auth_state.config().session_ttl_seconds());

    let outcome = auth_state
        .provider()
        .sign_in_with_password(email, password, requested_expiry)
        .await;

    let (user, session) = match outcome {
        Ok(SignInOutcome::Authenticated { user, session }) => (user, session),
        Ok(SignInOutcome::EmailUnconfirmed) => {
            return Err(email_not_verified());
        }
        Ok(SignInOutcome::InvalidCredentials(message))
        | Err(ProviderError::Rejected(message)) => {
            return Err(ApiResponse::unauthorized(4002, message));
        }
        Err(ProviderError::Unavailable(err)) => {
            error!("Login failed: {err}");
            return Err(ApiResponse::server_error(5002, "Server error during login"));
        }
    };

    // Some provider configurations let unverified users sign in. The gate
    // holds either way.
    if !user.email_confirmed() {
        return Err(email_not_verified());
    }

    Ok((user, session))
}

fn email_not_verified() -> ApiResponse {
    ApiResponse::unauthorized(4001, "Please verify your email before logging in")
        .with_meta(json!({ "code": "EMAIL_NOT_VERIFIED" }))
}

fn session_payload(user: &ProviderUser, session: &ProviderSession, fallback_ttl: i64) -> Value {
    json!({
        "session": {
            "access_token": session.access_token,
            "expires_at": session.expires_at.normalize(fallback_ttl),
        },
        "user": {
            "id": user.id,
            "email": user.email,
        }
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse),
        (status = 400, description = "Missing fields", body = ApiResponse),
        (status = 401, description = "Invalid credentials, unverified email, or second factor required", body = ApiResponse),
        (status = 500, description = "Provider or storage failure", body = ApiResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return ApiResponse::validation(1002, "Email and password are required");
    };

    let email = request
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|email| !email.is_empty());
    let password = request.password.filter(|password| !password.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return ApiResponse::validation(1002, "Email and password are required");
    };

    let (user, session) = match verify_credentials(&auth_state, &email, &password).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    // Second-factor dispatch reads the local profile. A storage failure here
    // must not hand out a session for a possibly protected account.
    let state = match auth_state.store().find_profile(user.id).await {
        Ok(profile) => profile.map_or(SecondFactorState::Disabled, |profile| profile.state()),
        Err(err) => {
            error!("Failed to load second factor profile: {err}");
            return ApiResponse::server_error(5002, "Server error during login");
        }
    };

    let fallback_ttl = auth_state.config().session_ttl_seconds();

    if state == SecondFactorState::Active {
        match auth_state.config().second_factor_policy() {
            SecondFactorPolicy::Refuse => {
                // The provider session is dropped, never returned.
                return ApiResponse::unauthorized(4003, "Two-factor authentication required")
                    .with_meta(json!({ "code": "TOTP_REQUIRED", "requiresTwoFactor": true }));
            }
            SecondFactorPolicy::Advisory => {
                return ApiResponse::ok(2002, StatusCode::OK, "Login successful")
                    .with_payload(session_payload(&user, &session, fallback_ttl))
                    .with_meta(json!({ "requiresTwoFactor": true }));
            }
        }
    }

    ApiResponse::ok(2002, StatusCode::OK, "Login successful")
        .with_payload(session_payload(&user, &session, fallback_ttl))
}

#[utoipa::path(
    post,
    path = "/api/auth/login-totp",
    request_body = TotpLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse),
        (status = 400, description = "Missing fields", body = ApiResponse),
        (status = 401, description = "Invalid credentials or verification code", body = ApiResponse),
        (status = 500, description = "Provider or storage failure", body = ApiResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn login_totp(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TotpLoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return ApiResponse::validation(1006, "Email, password and verification code are required");
    };

    let email = request
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|email| !email.is_empty());
    let password = request.password.filter(|password| !password.is_empty());
    let code = request.code.filter(|code| !code.is_empty());
    let (Some(email), Some(password), Some(code)) = (email, password, code) else {
        return ApiResponse::validation(1006, "Email, password and verification code are required");
    };

    let (user, session) = match verify_credentials(&auth_state, &email, &password).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let profile = match auth_state.store().find_profile(user.id).await {
        Ok(profile) => profile,
        Err(err) => {
            error!("Failed to load second factor profile: {err}");
            return ApiResponse::server_error(5002, "Server error during login");
        }
    };

    // The code login only exists for accounts with an active factor, and the
    // code is only ever checked against the active secret.
    let secret = profile
        .filter(|profile| profile.state() == SecondFactorState::Active)
        .and_then(|profile| profile.totp_secret);
    let Some(secret) = secret else {
        return ApiResponse::unauthorized(4004, "Invalid verification code");
    };

    if !auth_state.totp().verify_code(&secret, &code) {
        warn!("Invalid TOTP code for {}", user.id);
        return ApiResponse::unauthorized(4004, "Invalid verification code");
    }

    let fallback_ttl = auth_state.config().session_ttl_seconds();
    ApiResponse::ok(2006, StatusCode::OK, "Login successful")
        .with_payload(session_payload(&user, &session, fallback_ttl))
}
