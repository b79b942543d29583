//! Trusted device registry for biometric login.
//!
//! The registry only mirrors which devices hold a biometric-protected
//! credential. Enrollment is per device and rejected on duplicates, so a
//! device row is never silently replaced.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, instrument};

use crate::api::response::ApiResponse;
use crate::store::{NewTrustedDevice, RegisterDeviceOutcome};

use super::principal::require_user;
use super::state::AuthState;
use super::types::{DisableBiometricRequest, EnableBiometricRequest};
use super::utils::required_fields_payload;

#[utoipa::path(
    post,
    path = "/api/biometric/enable",
    request_body = EnableBiometricRequest,
    responses(
        (status = 200, description = "Device registered", body = ApiResponse),
        (status = 400, description = "Missing fields or device already registered", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 500, description = "Storage failure", body = ApiResponse)
    ),
    security(("bearer" = [])),
    tag = "biometric"
)]
#[instrument(skip(headers, auth_state, payload))]
pub async fn enable_biometric(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<EnableBiometricRequest>>,
) -> impl IntoResponse {
    let principal = match require_user(&headers, auth_state.provider()).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let (device_id, device_model, device_platform) = match payload {
        Some(Json(request)) => (
            request.device_id.filter(|v| !v.is_empty()),
            request.device_model.filter(|v| !v.is_empty()),
            request.device_platform.filter(|v| !v.is_empty()),
        ),
        None => (None, None, None),
    };

    let (device_id, device_model, device_platform) =
        match (device_id, device_model, device_platform) {
            (Some(id), Some(model), Some(platform)) => (id, model, platform),
            (device_id, device_model, device_platform) => {
                return ApiResponse::validation(1101, "Missing required fields").with_payload(
                    required_fields_payload(&[
                        ("device_id", device_id.is_some()),
                        ("device_model", device_model.is_some()),
                        ("device_platform", device_platform.is_some()),
                    ]),
                );
            }
        };

    let device = NewTrustedDevice {
        device_id: &device_id,
        device_model: &device_model,
        device_platform: &device_platform,
    };

    match auth_state
        .store()
        .register_device(principal.user.id, device)
        .await
    {
        Ok(RegisterDeviceOutcome::Registered) => {
            ApiResponse::ok(2101, StatusCode::OK, "Biometric authentication enabled successfully")
        }
        Ok(RegisterDeviceOutcome::AlreadyRegistered) => ApiResponse::validation(
            4103,
            "Biometric authentication is already enabled for this device",
        ),
        Err(err) => {
            error!("Failed to register device: {err}");
            ApiResponse::server_error(5101, "Server error while enabling biometric")
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/biometric/disable",
    request_body = DisableBiometricRequest,
    responses(
        (status = 200, description = "Device revoked, also when it was never registered", body = ApiResponse),
        (status = 400, description = "Missing device id", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 500, description = "Storage failure", body = ApiResponse)
    ),
    security(("bearer" = [])),
    tag = "biometric"
)]
#[instrument(skip(headers, auth_state, payload))]
pub async fn disable_biometric(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<DisableBiometricRequest>>,
) -> impl IntoResponse {
    let principal = match require_user(&headers, auth_state.provider()).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let device_id = payload
        .and_then(|Json(request)| request.device_id)
        .filter(|id| !id.is_empty());
    let Some(device_id) = device_id else {
        return ApiResponse::validation(1102, "Device ID is required");
    };

    // Revocation is idempotent: revoking an unknown device is a success.
    match auth_state
        .store()
        .revoke_device(principal.user.id, &device_id)
        .await
    {
        Ok(()) => ApiResponse::ok(
            2102,
            StatusCode::OK,
            "Biometric authentication disabled successfully",
        ),
        Err(err) => {
            error!("Failed to revoke device: {err}");
            ApiResponse::server_error(5102, "Server error while disabling biometric")
        }
    }
}
