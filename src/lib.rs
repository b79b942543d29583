//! # Vigilo (Mobile Authentication Authority)
//!
//! `vigilo` authenticates end users for a mobile client and layers optional
//! second factors on top of a delegated identity provider (a GoTrue-compatible
//! HTTP API). Credential storage, password hashing, and email confirmation stay
//! with the provider; this service owns the decisions built around it.
//!
//! ## Second factors
//!
//! - **TOTP:** enrollment creates a *pending* secret that only becomes active
//!   after the user proves possession of the authenticator (password plus a
//!   valid first code). A pending and an active secret are never set at the
//!   same time.
//! - **Trusted devices:** a per-device registry keyed by `(user, device)` used
//!   for biometric unlock on the client. Registration is explicit and never
//!   upserts; revocation is idempotent.
//!
//! ## Login dispatch
//!
//! After the provider accepts a password, the user's second factor state
//! decides what happens next. With an active TOTP factor the default policy
//! refuses to release the session until a valid code is presented on the
//! dedicated code-login endpoint. The weaker advisory policy (session plus a
//! `requiresTwoFactor` hint) is available for migration.
//!
//! ## Sessions
//!
//! Sessions are provider-issued and never persisted here. Expiry arrives in
//! more than one representation (RFC 3339 string, epoch seconds, or missing)
//! and is normalized to epoch seconds on every path that returns a session.

pub mod api;
pub mod cli;
pub mod provider;
pub mod session;
pub mod store;
pub mod totp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
