//! Second factor storage boundary.
//!
//! Profiles (TOTP secret lifecycle) and trusted devices (biometric unlock)
//! live behind [`TwoFactorStore`]. Handlers never see SQL; invariants that
//! matter under concurrency — one row per `(user, device)`, pending/active
//! secret exclusivity — are enforced by the backing store, not by in-process
//! locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage failure. Expected branches (missing rows, duplicate devices) are
/// modeled as outcomes on the individual operations, not as errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Second factor state of one profile row.
///
/// `totp_secret` is only set while `two_factor_enabled` is true, and never at
/// the same time as `pending_totp_secret`.
#[derive(Debug, Clone)]
pub struct SecondFactorProfile {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub two_factor_enabled: bool,
    pub totp_secret: Option<String>,
    pub pending_totp_secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SecondFactorProfile {
    /// Derive the state machine position from the row.
    #[must_use]
    pub fn state(&self) -> SecondFactorState {
        if self.two_factor_enabled && self.totp_secret.is_some() {
            SecondFactorState::Active
        } else if self.pending_totp_secret.is_some() {
            SecondFactorState::EnrollmentPending
        } else {
            SecondFactorState::Disabled
        }
    }
}

/// Position of an account in the TOTP enrollment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondFactorState {
    /// No TOTP factor, login is password-only.
    Disabled,
    /// A pending secret exists but has not been confirmed; does not gate login.
    EnrollmentPending,
    /// A confirmed secret exists; login requires a valid code.
    Active,
}

impl SecondFactorState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::EnrollmentPending => "enrollment_pending",
            Self::Active => "active",
        }
    }
}

/// A trusted device row for biometric unlock, keyed by `(user_id, device_id)`.
#[derive(Debug, Clone)]
pub struct TrustedDevice {
    pub user_id: Uuid,
    pub device_id: String,
    pub device_model: String,
    pub device_platform: String,
    pub registered_at: DateTime<Utc>,
}

/// Device attributes supplied at registration.
#[derive(Debug, Clone, Copy)]
pub struct NewTrustedDevice<'a> {
    pub device_id: &'a str,
    pub device_model: &'a str,
    pub device_platform: &'a str,
}

/// Outcome of a device registration attempt. Duplicates are rejected, never
/// upserted.
#[derive(Debug, PartialEq, Eq)]
pub enum RegisterDeviceOutcome {
    Registered,
    AlreadyRegistered,
}

#[async_trait]
pub trait TwoFactorStore: Send + Sync {
    /// Create the profile row for a freshly registered account. Idempotent:
    /// an existing row is left untouched.
    async fn create_profile(
        &self,
        user_id: Uuid,
        email: &str,
        name: &str,
    ) -> Result<(), StoreError>;

    /// Fetch the profile row, if one exists. Accounts registered before this
    /// service (or whose profile insert was lost) have no row and are treated
    /// as having no second factor.
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<SecondFactorProfile>, StoreError>;

    /// Start (or restart) TOTP enrollment by writing the pending secret.
    ///
    /// A previous pending secret is overwritten, and an active secret is
    /// cleared in the same statement so that a pending and an active secret
    /// never coexist. Creates the profile row when missing.
    async fn set_pending_secret(
        &self,
        user_id: Uuid,
        email: &str,
        secret: &str,
    ) -> Result<(), StoreError>;

    /// Promote the pending secret to active and flip the flag, in one
    /// statement guarded by the expected secret value.
    ///
    /// Returns `false` when the pending secret no longer matches (overwritten
    /// by a concurrent re-enrollment, or already promoted) — callers treat
    /// that as an ordinary invalid-code rejection.
    async fn promote_pending_secret(
        &self,
        user_id: Uuid,
        expected_secret: &str,
    ) -> Result<bool, StoreError>;

    /// Clear both secret slots and the flag. Idempotent.
    async fn clear_second_factor(&self, user_id: Uuid) -> Result<(), StoreError>;

    /// Register a trusted device. A `(user_id, device_id)` pair can exist at
    /// most once; the uniqueness constraint decides races.
    async fn register_device(
        &self,
        user_id: Uuid,
        device: NewTrustedDevice<'_>,
    ) -> Result<RegisterDeviceOutcome, StoreError>;

    /// Delete a trusted device. Succeeds even when no row matched.
    async fn revoke_device(&self, user_id: Uuid, device_id: &str) -> Result<(), StoreError>;

    /// Existence check used by the security-status read.
    async fn device_registered(&self, user_id: Uuid, device_id: &str) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(
        enabled: bool,
        active: Option<&str>,
        pending: Option<&str>,
    ) -> SecondFactorProfile {
        SecondFactorProfile {
            user_id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            two_factor_enabled: enabled,
            totp_secret: active.map(str::to_string),
            pending_totp_secret: pending.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn state_disabled_when_no_secrets() {
        assert_eq!(
            profile(false, None, None).state(),
            SecondFactorState::Disabled
        );
    }

    #[test]
    fn state_pending_when_pending_secret_set() {
        assert_eq!(
            profile(false, None, Some("S")).state(),
            SecondFactorState::EnrollmentPending
        );
    }

    #[test]
    fn state_active_when_enabled_with_secret() {
        assert_eq!(
            profile(true, Some("S"), None).state(),
            SecondFactorState::Active
        );
    }

    #[test]
    fn state_tolerates_flag_without_secret() {
        // A row that lost its secret must not lock the account out.
        assert_eq!(
            profile(true, None, None).state(),
            SecondFactorState::Disabled
        );
    }

    #[test]
    fn state_as_str_round_trip() {
        assert_eq!(SecondFactorState::Disabled.as_str(), "disabled");
        assert_eq!(
            SecondFactorState::EnrollmentPending.as_str(),
            "enrollment_pending"
        );
        assert_eq!(SecondFactorState::Active.as_str(), "active");
    }
}
