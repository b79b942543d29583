//! Identity provider integration.
//!
//! Registration, credential verification, email verification and session
//! issuance are delegated to a GoTrue-compatible identity provider. The
//! service never stores passwords and never mints tokens of its own, it only
//! inspects and forwards what the provider hands back.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::session::SessionExpiry;

pub mod http;
#[cfg(test)]
pub mod mock;

pub use http::HttpIdentityProvider;

/// Errors surfaced by the identity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider understood the request and refused it.
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// The provider could not be reached or answered with a server error.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// User record as reported by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
}

impl ProviderUser {
    /// The provider stamps `email_confirmed_at` once the address is verified.
    #[must_use]
    pub fn email_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Session issued by the provider after password verification.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub access_token: String,
    pub expires_at: SessionExpiry,
}

/// Outcome of a password sign-in attempt.
#[derive(Debug)]
pub enum SignInOutcome {
    /// Credentials verified, session issued.
    Authenticated {
        user: ProviderUser,
        session: ProviderSession,
    },
    /// Credentials are valid but the email address is not verified yet.
    EmailUnconfirmed,
    /// The provider rejected the credentials.
    InvalidCredentials(String),
}

/// Operations the service delegates to the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account. The provider sends the verification email.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<ProviderUser, ProviderError>;

    /// Verify credentials and obtain a session.
    ///
    /// `requested_expiry_seconds` is advisory. Providers that issue
    /// fixed-lifetime tokens ignore it.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
        requested_expiry_seconds: Option<i64>,
    ) -> Result<SignInOutcome, ProviderError>;

    /// Redeem an email verification token.
    async fn verify_email_token(&self, token: &str) -> Result<(), ProviderError>;

    /// Ask the provider to send a fresh verification email.
    async fn resend_verification(&self, email: &str) -> Result<(), ProviderError>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;

    /// Resolve an access token to its user, `None` when invalid or expired.
    async fn user_from_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<ProviderUser>, ProviderError>;

    /// Liveness probe against the provider.
    async fn health(&self) -> Result<(), ProviderError>;
}

/// GoTrue reports an unverified address with the `email_not_confirmed` error
/// code. Older deployments only carry the human-readable message, so fall
/// back to matching it.
pub(crate) fn is_email_unconfirmed(error_code: Option<&str>, message: &str) -> bool {
    if error_code == Some("email_not_confirmed") {
        return true;
    }
    message.contains("Email not confirmed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_confirmed_follows_timestamp_presence() {
        let mut user = ProviderUser {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            email_confirmed_at: None,
        };
        assert!(!user.email_confirmed());

        user.email_confirmed_at = Some("2025-04-26T12:24:30Z".to_string());
        assert!(user.email_confirmed());
    }

    #[test]
    fn unconfirmed_detection_prefers_structured_code() {
        assert!(is_email_unconfirmed(
            Some("email_not_confirmed"),
            "anything at all"
        ));
        assert!(!is_email_unconfirmed(
            Some("invalid_credentials"),
            "Invalid login credentials"
        ));
    }

    #[test]
    fn unconfirmed_detection_falls_back_to_message() {
        assert!(is_email_unconfirmed(None, "Email not confirmed"));
        assert!(!is_email_unconfirmed(None, "Invalid login credentials"));
    }

    #[test]
    fn provider_user_deserializes_from_wire_shape() {
        let user: ProviderUser = serde_json::from_value(serde_json::json!({
            "id": "b4b4b20e-3a24-4a0c-8b5a-9f2c24a3f2de",
            "email": "a@example.com",
            "aud": "authenticated",
            "role": "authenticated"
        }))
        .unwrap();
        assert_eq!(user.email, "a@example.com");
        assert!(!user.email_confirmed());
    }
}
