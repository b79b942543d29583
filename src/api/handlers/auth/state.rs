//! Auth state and configuration.

use std::sync::Arc;

use crate::provider::IdentityProvider;
use crate::store::TwoFactorStore;
use crate::totp::TotpEngine;

const DEFAULT_TOTP_ISSUER: &str = "vigilo";
const DEFAULT_SESSION_TTL_SECONDS: i64 = 3 * 24 * 60 * 60;

/// What a standard password login does for accounts with an active second
/// factor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SecondFactorPolicy {
    /// Refuse the login and discard the provider session. The client has to
    /// go through the code login.
    #[default]
    Refuse,
    /// Hand out the session and flag the account in `meta`.
    Advisory,
}

impl SecondFactorPolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refuse => "refuse",
            Self::Advisory => "advisory",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "refuse" => Some(Self::Refuse),
            "advisory" => Some(Self::Advisory),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    totp_issuer: String,
    second_factor_policy: SecondFactorPolicy,
    session_ttl_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
            second_factor_policy: SecondFactorPolicy::default(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: String) -> Self {
        self.totp_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_second_factor_policy(mut self, policy: SecondFactorPolicy) -> Self {
        self.second_factor_policy = policy;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn totp_issuer(&self) -> &str {
        &self.totp_issuer
    }

    #[must_use]
    pub fn second_factor_policy(&self) -> SecondFactorPolicy {
        self.second_factor_policy
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }
}

pub struct AuthState {
    config: AuthConfig,
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn TwoFactorStore>,
    totp: TotpEngine,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn TwoFactorStore>,
    ) -> Self {
        let totp = TotpEngine::new(config.totp_issuer().to_string());
        Self {
            config,
            provider,
            store,
            totp,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn TwoFactorStore {
        self.store.as_ref()
    }

    pub(super) fn totp(&self) -> &TotpEngine {
        &self.totp
    }
}
