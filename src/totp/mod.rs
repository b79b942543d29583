//! TOTP code generation and verification.
//!
//! Parameters match the common authenticator defaults: SHA-1, 6 digits, 30
//! second step, with one step of skew in either direction to absorb clock
//! drift between the server and the authenticator app.

use anyhow::{anyhow, Result};
use totp_rs::{Algorithm, Secret, TOTP};

/// A freshly generated enrollment: the base32 secret for manual entry plus the
/// `otpauth://` URL the client renders as a QR code.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub secret_base32: String,
    pub otpauth_url: String,
}

/// Stateless TOTP engine. Secrets live in the profile store; this only knows
/// how to mint and check them under the configured issuer label.
#[derive(Clone, Debug)]
pub struct TotpEngine {
    issuer: String,
}

impl TotpEngine {
    #[must_use]
    pub fn new(issuer: String) -> Self {
        Self { issuer }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Begins enrollment: generates a fresh secret and the provisioning URL
    /// labeled `issuer:account`.
    ///
    /// # Errors
    /// Returns an error if secret generation fails or the account label is not
    /// accepted by the URL encoder (e.g. contains `:`).
    pub fn begin_enrollment(&self, account: &str) -> Result<Enrollment> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|e| anyhow!("Secret gen error: {e}"))?;

        let totp = TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| anyhow!("TOTP init error: {e}"))?;

        Ok(Enrollment {
            secret_base32: totp.get_secret_base32(),
            otpauth_url: totp.get_url(),
        })
    }

    /// Checks a code against a stored base32 secret.
    ///
    /// Never errors: malformed secrets, bad codes, and clock failures all
    /// verify as `false`.
    #[must_use]
    pub fn verify_code(&self, secret_base32: &str, code: &str) -> bool {
        let Ok(secret_bytes) = Secret::Encoded(secret_base32.to_string()).to_bytes() else {
            return false;
        };

        let Ok(totp) = TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            secret_bytes,
            Some(self.issuer.clone()),
            // label doesn't matter for check
            "user".to_string(),
        ) else {
            return false;
        };

        totp.check_current(code).unwrap_or(false)
    }
}
