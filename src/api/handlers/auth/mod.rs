//! Auth handlers and supporting modules.
//!
//! Credential verification, signup and session issuance are delegated to a
//! GoTrue-compatible identity provider. What lives here is everything the
//! provider does not do for a mobile client: the TOTP second factor
//! lifecycle, the login dispatch for protected accounts, and the
//! trusted-device registry behind biometric login.
//!
//! ## Second factor lifecycle
//!
//! Enrollment is two-step: `enable-2fa` parks a fresh secret in a pending
//! slot, `verify-2fa` promotes it once the caller proves possession with a
//! current code. Until promotion the factor does not protect login, so an
//! interrupted setup never locks anyone out. At most one of the pending and
//! active slots is populated at any time.

pub(crate) mod biometric;
pub(crate) mod login;
pub(crate) mod principal;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod twofactor;
pub(crate) mod types;
mod utils;
pub(crate) mod verification;

pub use state::{AuthConfig, AuthState, SecondFactorPolicy};
