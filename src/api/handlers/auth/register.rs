//! Account registration, delegated to the identity provider.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, instrument};

use crate::api::response::ApiResponse;
use crate::provider::ProviderError;

use super::state::AuthState;
use super::types::RegisterRequest;
use super::utils::{normalize_email, required_fields_payload, valid_email};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification email sent", body = ApiResponse),
        (status = 400, description = "Missing or invalid fields, or the provider rejected the signup", body = ApiResponse),
        (status = 500, description = "Provider unreachable", body = ApiResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return ApiResponse::validation(1001, "Missing required fields").with_payload(
            required_fields_payload(&[("email", false), ("password", false), ("name", false)]),
        );
    };

    let email = request
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|email| !email.is_empty());
    let password = request.password.filter(|password| !password.is_empty());
    let name = request
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let (email, password, name) = match (email, password, name) {
        (Some(email), Some(password), Some(name)) => (email, password, name),
        (email, password, name) => {
            return ApiResponse::validation(1001, "Missing required fields").with_payload(
                required_fields_payload(&[
                    ("email", email.is_some()),
                    ("password", password.is_some()),
                    ("name", name.is_some()),
                ]),
            );
        }
    };

    if !valid_email(&email) {
        return ApiResponse::validation(1001, "Invalid email address");
    }

    let user = match auth_state.provider().sign_up(&email, &password, &name).await {
        Ok(user) => user,
        Err(ProviderError::Rejected(message)) => {
            return ApiResponse::validation(4007, message);
        }
        Err(ProviderError::Unavailable(err)) => {
            error!("Registration failed: {err}");
            return ApiResponse::server_error(5001, "Server error during registration");
        }
    };

    // The profile row is best-effort here: the account already exists at the
    // provider, and the row is recreated on first enrollment.
    if let Err(err) = auth_state
        .store()
        .create_profile(user.id, &email, &name)
        .await
    {
        error!("Failed to create profile for {}: {err}", user.id);
    }

    ApiResponse::ok(
        2001,
        StatusCode::CREATED,
        "Registration successful. Please check your email for verification.",
    )
    .with_payload(json!({
        "id": user.id,
        "email": user.email,
        "name": name,
    }))
}
