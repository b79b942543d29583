//! Request types for the auth endpoints.
//!
//! Body fields are optional on the wire. Handlers validate presence
//! themselves so a missing field and a missing body produce the same
//! validation envelope instead of an axum rejection.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct TotpLoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub code: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct ResendVerificationRequest {
    pub email: Option<String>,
}

/// Shared body of the enrollment-verify and disable endpoints: both
/// re-verify the password and take a current code.
#[derive(ToSchema, Deserialize, Debug)]
pub struct TwoFactorCodeRequest {
    pub password: Option<String>,
    pub code: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct EnableBiometricRequest {
    pub device_id: Option<String>,
    pub device_model: Option<String>,
    pub device_platform: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct DisableBiometricRequest {
    pub device_id: Option<String>,
}

#[derive(IntoParams, Deserialize, Debug)]
pub struct VerifyEmailQuery {
    /// Verification token from the emailed link.
    pub token: Option<String>,
}

#[derive(IntoParams, Deserialize, Debug)]
pub struct SecurityStatusQuery {
    /// When present, the response also reports whether this device is
    /// registered for biometric login.
    pub device_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_body_fields_deserialize_to_none() {
        let request: RegisterRequest = serde_json::from_str(r#"{"email":"a@example.com"}"#)
            .expect("partial body should deserialize");
        assert_eq!(request.email.as_deref(), Some("a@example.com"));
        assert!(request.password.is_none());
        assert!(request.name.is_none());

        let request: TotpLoginRequest = serde_json::from_str("{}").expect("empty body");
        assert!(request.email.is_none());
        assert!(request.password.is_none());
        assert!(request.code.is_none());
    }
}
