use crate::api::{
    handlers::{auth, health, root},
    response,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        root::root,
        health::health,
        auth::register::register,
        auth::login::login,
        auth::login::login_totp,
        auth::verification::verify_email,
        auth::verification::resend_verification,
        auth::session::logout,
        auth::twofactor::enable_2fa,
        auth::twofactor::verify_2fa,
        auth::twofactor::disable_2fa,
        auth::twofactor::security_status,
        auth::biometric::enable_biometric,
        auth::biometric::disable_biometric,
    ),
    components(schemas(
        response::ApiResponse,
        health::Health,
        auth::types::RegisterRequest,
        auth::types::LoginRequest,
        auth::types::TotpLoginRequest,
        auth::types::ResendVerificationRequest,
        auth::types::TwoFactorCodeRequest,
        auth::types::EnableBiometricRequest,
        auth::types::DisableBiometricRequest,
    )),
    tags(
        (name = "auth", description = "Registration, login, logout and email verification"),
        (name = "two-factor", description = "TOTP enrollment, login policy and security status"),
        (name = "biometric", description = "Trusted device registry for biometric unlock"),
        (name = "health", description = "Service and dependency health"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

/// Registers the `bearer` scheme the protected paths reference: the provider
/// access token, sent as `Authorization: Bearer <token>`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
