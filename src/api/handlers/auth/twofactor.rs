//! TOTP second factor lifecycle: enrollment, confirmation, disabling, and
//! the combined security status view.
//!
//! Enrollment is two-step. `enable` parks a fresh secret in the pending slot
//! and `verify` promotes it once the caller proves possession with a current
//! code. Until promotion the factor does not protect login. Disabling
//! re-verifies the password and a current code against the active secret.
//!
//! Guard failures all answer with the same envelope so callers cannot tell
//! a wrong password from a wrong code or probe enrollment state.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, instrument};

use crate::api::response::ApiResponse;
use crate::provider::{ProviderError, SignInOutcome};
use crate::store::SecondFactorState;

use super::principal::require_user;
use super::state::AuthState;
use super::types::{SecurityStatusQuery, TwoFactorCodeRequest};

const INVALID_PASSWORD_OR_CODE: &str = "Invalid password or two-factor code";

/// Re-verify the caller's password. The session the provider mints for this
/// check is dropped on the floor.
async fn password_verified(
    auth_state: &AuthState,
    email: &str,
    password: &str,
) -> Result<bool, ProviderError> {
    match auth_state
        .provider()
        .sign_in_with_password(email, password, None)
        .await
    {
        Ok(SignInOutcome::Authenticated { .. }) => Ok(true),
        Ok(_) | Err(ProviderError::Rejected(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

#[utoipa::path(
    post,
    path = "/api/verification/enable-2fa",
    responses(
        (status = 200, description = "Enrollment started, secret and provisioning URL returned", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 500, description = "Provider or storage failure", body = ApiResponse)
    ),
    security(("bearer" = [])),
    tag = "two-factor"
)]
#[instrument(skip(headers, auth_state))]
pub async fn enable_2fa(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_user(&headers, auth_state.provider()).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let enrollment = match auth_state.totp().begin_enrollment(&principal.user.email) {
        Ok(enrollment) => enrollment,
        Err(err) => {
            error!("Failed to begin TOTP enrollment: {err}");
            return ApiResponse::server_error(5201, "Server error while enabling 2FA");
        }
    };

    // One statement parks the new secret and clears any active factor, so
    // calling enable again always restarts enrollment.
    if let Err(err) = auth_state
        .store()
        .set_pending_secret(
            principal.user.id,
            &principal.user.email,
            &enrollment.secret_base32,
        )
        .await
    {
        error!("Failed to store pending TOTP secret: {err}");
        return ApiResponse::server_error(5201, "Server error while enabling 2FA");
    }

    ApiResponse::ok(2201, StatusCode::OK, "Two-factor enrollment started").with_payload(json!({
        "secret": enrollment.secret_base32,
        "otpauth_url": enrollment.otpauth_url,
    }))
}

#[utoipa::path(
    post,
    path = "/api/verification/verify-2fa",
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "Second factor enabled", body = ApiResponse),
        (status = 400, description = "Missing fields", body = ApiResponse),
        (status = 401, description = "Guard failed or no enrollment in flight", body = ApiResponse),
        (status = 500, description = "Provider or storage failure", body = ApiResponse)
    ),
    security(("bearer" = [])),
    tag = "two-factor"
)]
#[instrument(skip(headers, auth_state, payload))]
pub async fn verify_2fa(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TwoFactorCodeRequest>>,
) -> impl IntoResponse {
    let principal = match require_user(&headers, auth_state.provider()).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let (password, code) = match fields(payload) {
        Some(pair) => pair,
        None => {
            return ApiResponse::validation(1202, "Password and verification code are required");
        }
    };

    match password_verified(&auth_state, &principal.user.email, &password).await {
        Ok(true) => {}
        Ok(false) => return ApiResponse::unauthorized(4202, INVALID_PASSWORD_OR_CODE),
        Err(err) => {
            error!("Password re-verification failed: {err}");
            return ApiResponse::server_error(5202, "Server error during 2FA verification");
        }
    }

    let profile = match auth_state.store().find_profile(principal.user.id).await {
        Ok(profile) => profile,
        Err(err) => {
            error!("Failed to load second factor profile: {err}");
            return ApiResponse::server_error(5202, "Server error during 2FA verification");
        }
    };

    // No enrollment in flight answers exactly like a bad code.
    let pending = profile.and_then(|profile| profile.pending_totp_secret);
    let Some(pending) = pending else {
        return ApiResponse::unauthorized(4202, INVALID_PASSWORD_OR_CODE);
    };

    if !auth_state.totp().verify_code(&pending, &code) {
        return ApiResponse::unauthorized(4202, INVALID_PASSWORD_OR_CODE);
    }

    match auth_state
        .store()
        .promote_pending_secret(principal.user.id, &pending)
        .await
    {
        Ok(true) => ApiResponse::ok(2202, StatusCode::OK, "Two-factor authentication enabled"),
        // The pending secret changed under us, so the code the caller holds
        // no longer belongs to an enrollment.
        Ok(false) => ApiResponse::unauthorized(4202, INVALID_PASSWORD_OR_CODE),
        Err(err) => {
            error!("Failed to promote pending TOTP secret: {err}");
            ApiResponse::server_error(5202, "Server error during 2FA verification")
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/verification/disable-2fa",
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "Second factor disabled", body = ApiResponse),
        (status = 400, description = "Missing fields", body = ApiResponse),
        (status = 401, description = "Guard failed or no active factor", body = ApiResponse),
        (status = 500, description = "Provider or storage failure", body = ApiResponse)
    ),
    security(("bearer" = [])),
    tag = "two-factor"
)]
#[instrument(skip(headers, auth_state, payload))]
pub async fn disable_2fa(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TwoFactorCodeRequest>>,
) -> impl IntoResponse {
    let principal = match require_user(&headers, auth_state.provider()).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let (password, code) = match fields(payload) {
        Some(pair) => pair,
        None => {
            return ApiResponse::validation(1203, "Password and verification code are required");
        }
    };

    match password_verified(&auth_state, &principal.user.email, &password).await {
        Ok(true) => {}
        Ok(false) => return ApiResponse::unauthorized(4203, INVALID_PASSWORD_OR_CODE),
        Err(err) => {
            error!("Password re-verification failed: {err}");
            return ApiResponse::server_error(5203, "Server error while disabling 2FA");
        }
    }

    let profile = match auth_state.store().find_profile(principal.user.id).await {
        Ok(profile) => profile,
        Err(err) => {
            error!("Failed to load second factor profile: {err}");
            return ApiResponse::server_error(5203, "Server error while disabling 2FA");
        }
    };

    // Disable requires possession of the active factor.
    let active = profile
        .filter(|profile| profile.state() == SecondFactorState::Active)
        .and_then(|profile| profile.totp_secret);
    let Some(active) = active else {
        return ApiResponse::unauthorized(4203, INVALID_PASSWORD_OR_CODE);
    };

    if !auth_state.totp().verify_code(&active, &code) {
        return ApiResponse::unauthorized(4203, INVALID_PASSWORD_OR_CODE);
    }

    match auth_state.store().clear_second_factor(principal.user.id).await {
        Ok(()) => ApiResponse::ok(2203, StatusCode::OK, "Two-factor authentication disabled"),
        Err(err) => {
            error!("Failed to clear second factor: {err}");
            ApiResponse::server_error(5203, "Server error while disabling 2FA")
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/verification/security-status",
    params(SecurityStatusQuery),
    responses(
        (status = 200, description = "Second factor and biometric state for the caller", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 500, description = "Storage failure", body = ApiResponse)
    ),
    security(("bearer" = [])),
    tag = "two-factor"
)]
#[instrument(skip(headers, auth_state, query))]
pub async fn security_status(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    query: Query<SecurityStatusQuery>,
) -> impl IntoResponse {
    let principal = match require_user(&headers, auth_state.provider()).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let state = match auth_state.store().find_profile(principal.user.id).await {
        Ok(profile) => profile.map_or(SecondFactorState::Disabled, |profile| profile.state()),
        Err(err) => {
            error!("Failed to load second factor profile: {err}");
            return ApiResponse::server_error(5204, "Server error while fetching security status");
        }
    };

    let mut payload = json!({
        "twoFactorEnabled": state == SecondFactorState::Active,
        "twoFactorPending": state == SecondFactorState::EnrollmentPending,
    });

    if let Some(device_id) = query.0.device_id.filter(|id| !id.is_empty()) {
        match auth_state
            .store()
            .device_registered(principal.user.id, &device_id)
            .await
        {
            Ok(registered) => {
                payload["biometricRegistered"] = Value::Bool(registered);
            }
            Err(err) => {
                error!("Failed to check device registration: {err}");
                return ApiResponse::server_error(
                    5204,
                    "Server error while fetching security status",
                );
            }
        }
    }

    ApiResponse::ok(2204, StatusCode::OK, "Security status retrieved").with_payload(payload)
}

fn fields(payload: Option<Json<TwoFactorCodeRequest>>) -> Option<(String, String)> {
    let Json(request) = payload?;
    let password = request.password.filter(|password| !password.is_empty())?;
    let code = request.code.filter(|code| !code.is_empty())?;
    Some((password, code))
}
