//! Behavioral identity provider fake for handler tests.
//!
//! Keeps accounts, sessions and verification tokens in memory and answers
//! with the same messages a GoTrue deployment would, so handler tests
//! exercise the real mapping logic.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::SessionExpiry;

use super::{IdentityProvider, ProviderError, ProviderSession, ProviderUser, SignInOutcome};

#[derive(Clone)]
struct Account {
    id: Uuid,
    password: String,
    confirmed: bool,
}

#[derive(Default)]
pub struct MockProvider {
    /// email -> account
    accounts: RwLock<HashMap<String, Account>>,
    /// access token -> email
    sessions: RwLock<HashMap<String, String>>,
    /// verification token -> email
    verification_tokens: RwLock<HashMap<String, String>>,
    /// expiry shape handed back on sign-in
    expiry: RwLock<SessionExpiry>,
    last_requested_expiry: RwLock<Option<i64>>,
    unavailable: AtomicBool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`ProviderError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Choose the expiry shape returned on sign-in.
    pub async fn set_expiry(&self, expiry: SessionExpiry) {
        *self.expiry.write().await = expiry;
    }

    /// Mark an account as email-verified without redeeming a token.
    pub async fn confirm(&self, email: &str) {
        if let Some(account) = self.accounts.write().await.get_mut(email) {
            account.confirmed = true;
        }
    }

    /// The verification token the provider "emailed" for an address.
    pub async fn verification_token_for(&self, email: &str) -> Option<String> {
        self.verification_tokens
            .read()
            .await
            .iter()
            .find(|(_, e)| e.as_str() == email)
            .map(|(token, _)| token.clone())
    }

    /// What the last sign-in asked for as session lifetime.
    pub async fn last_requested_expiry(&self) -> Option<i64> {
        *self.last_requested_expiry.read().await
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable(
                "identity provider offline".to_string(),
            ));
        }
        Ok(())
    }

    fn user_for(email: &str, account: &Account) -> ProviderUser {
        ProviderUser {
            id: account.id,
            email: email.to_string(),
            email_confirmed_at: account
                .confirmed
                .then(|| "2025-01-01T00:00:00Z".to_string()),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _name: &str,
    ) -> Result<ProviderUser, ProviderError> {
        self.check_available()?;

        if password.len() < 6 {
            return Err(ProviderError::Rejected(
                "Password should be at least 6 characters".to_string(),
            ));
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(ProviderError::Rejected(
                "User already registered".to_string(),
            ));
        }

        let account = Account {
            id: Uuid::new_v4(),
            password: password.to_string(),
            confirmed: false,
        };
        let user = Self::user_for(email, &account);
        accounts.insert(email.to_string(), account);

        self.verification_tokens
            .write()
            .await
            .insert(format!("verify-{}", Uuid::new_v4()), email.to_string());

        Ok(user)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
        requested_expiry_seconds: Option<i64>,
    ) -> Result<SignInOutcome, ProviderError> {
        self.check_available()?;

        *self.last_requested_expiry.write().await = requested_expiry_seconds;

        let accounts = self.accounts.read().await;
        let Some(account) = accounts.get(email) else {
            return Ok(SignInOutcome::InvalidCredentials(
                "Invalid login credentials".to_string(),
            ));
        };
        if account.password != password {
            return Ok(SignInOutcome::InvalidCredentials(
                "Invalid login credentials".to_string(),
            ));
        }
        if !account.confirmed {
            return Ok(SignInOutcome::EmailUnconfirmed);
        }

        let user = Self::user_for(email, account);
        drop(accounts);

        let access_token = format!("token-{}", Uuid::new_v4());
        self.sessions
            .write()
            .await
            .insert(access_token.clone(), email.to_string());

        Ok(SignInOutcome::Authenticated {
            user,
            session: ProviderSession {
                access_token,
                expires_at: self.expiry.read().await.clone(),
            },
        })
    }

    async fn verify_email_token(&self, token: &str) -> Result<(), ProviderError> {
        self.check_available()?;

        let Some(email) = self.verification_tokens.write().await.remove(token) else {
            return Err(ProviderError::Rejected(
                "Email link is invalid or has expired".to_string(),
            ));
        };
        self.confirm(&email).await;
        Ok(())
    }

    async fn resend_verification(&self, email: &str) -> Result<(), ProviderError> {
        self.check_available()?;

        let accounts = self.accounts.read().await;
        match accounts.get(email) {
            Some(account) if account.confirmed => Err(ProviderError::Rejected(
                "Email address already confirmed".to_string(),
            )),
            Some(_) => {
                drop(accounts);
                self.verification_tokens
                    .write()
                    .await
                    .insert(format!("verify-{}", Uuid::new_v4()), email.to_string());
                Ok(())
            }
            // Unknown addresses are not revealed.
            None => Ok(()),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        self.check_available()?;

        if self.sessions.write().await.remove(access_token).is_none() {
            return Err(ProviderError::Rejected("session not found".to_string()));
        }
        Ok(())
    }

    async fn user_from_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<ProviderUser>, ProviderError> {
        self.check_available()?;

        let sessions = self.sessions.read().await;
        let Some(email) = sessions.get(access_token) else {
            return Ok(None);
        };
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(email)
            .map(|account| Self::user_for(email, account)))
    }

    async fn health(&self) -> Result<(), ProviderError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signup_then_verify_then_sign_in() {
        let provider = MockProvider::new();
        provider
            .sign_up("a@example.com", "hunter22", "A")
            .await
            .unwrap();

        // Unverified accounts cannot sign in yet.
        let outcome = provider
            .sign_in_with_password("a@example.com", "hunter22", None)
            .await
            .unwrap();
        assert!(matches!(outcome, SignInOutcome::EmailUnconfirmed));

        let token = provider
            .verification_token_for("a@example.com")
            .await
            .unwrap();
        provider.verify_email_token(&token).await.unwrap();

        let outcome = provider
            .sign_in_with_password("a@example.com", "hunter22", Some(60))
            .await
            .unwrap();
        let SignInOutcome::Authenticated { user, session } = outcome else {
            panic!("expected a session");
        };
        assert_eq!(user.email, "a@example.com");
        assert!(user.email_confirmed());
        assert_eq!(provider.last_requested_expiry().await, Some(60));

        // The issued token resolves back to the user until sign-out.
        let resolved = provider
            .user_from_access_token(&session.access_token)
            .await
            .unwrap();
        assert!(resolved.is_some());

        provider.sign_out(&session.access_token).await.unwrap();
        let resolved = provider
            .user_from_access_token(&session.access_token)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let provider = MockProvider::new();
        provider
            .sign_up("a@example.com", "hunter22", "A")
            .await
            .unwrap();
        provider.confirm("a@example.com").await;

        let outcome = provider
            .sign_in_with_password("a@example.com", "wrong", None)
            .await
            .unwrap();
        assert!(matches!(outcome, SignInOutcome::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn duplicate_and_weak_signups_are_rejected() {
        let provider = MockProvider::new();
        provider
            .sign_up("a@example.com", "hunter22", "A")
            .await
            .unwrap();

        assert!(matches!(
            provider.sign_up("a@example.com", "hunter22", "A").await,
            Err(ProviderError::Rejected(_))
        ));
        assert!(matches!(
            provider.sign_up("b@example.com", "short", "B").await,
            Err(ProviderError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn unavailable_flag_fails_every_call() {
        let provider = MockProvider::new();
        provider.set_unavailable(true);

        assert!(matches!(
            provider.health().await,
            Err(ProviderError::Unavailable(_))
        ));
        assert!(matches!(
            provider.sign_up("a@example.com", "hunter22", "A").await,
            Err(ProviderError::Unavailable(_))
        ));
    }
}
