//! GoTrue-compatible HTTP client for the identity provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::session::SessionExpiry;
use crate::APP_USER_AGENT;

use super::{
    is_email_unconfirmed, IdentityProvider, ProviderError, ProviderSession, ProviderUser,
    SignInOutcome,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Wire shape of `POST /auth/v1/token`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_at: SessionExpiry,
    user: ProviderUser,
}

pub struct HttpIdentityProvider {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpIdentityProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: Url, api_key: SecretString) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Error creating identity provider client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/auth/v1/{path}",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    /// Turn a non-success response into a provider error, keeping the
    /// provider's own message when one is present.
    async fn rejection(response: Response) -> ProviderError {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let (_, message) = error_parts(&body);

        debug!("provider rejected request: {} - {}", status, message);

        if status.is_server_error() {
            ProviderError::Unavailable(message)
        } else {
            ProviderError::Rejected(message)
        }
    }
}

/// Extract the structured error code and human message from a provider error
/// body. GoTrue has grown three shapes over the years: `{error_code, msg}`,
/// `{error, error_description}` and `{message}`.
fn error_parts(body: &Value) -> (Option<String>, String) {
    let code = body
        .get("error_code")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    let message = body
        .get("msg")
        .or_else(|| body.get("error_description"))
        .or_else(|| body.get("message"))
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("identity provider rejected the request")
        .to_string();

    (code, message)
}

/// The signup endpoint returns the user at the root, the token endpoint nests
/// it under `user`.
fn user_from_value(body: &Value) -> Option<ProviderUser> {
    let node = body.get("user").unwrap_or(body);
    serde_json::from_value(node.clone()).ok()
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    #[instrument(skip(self, password))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<ProviderUser, ProviderError> {
        let response = self
            .client
            .post(self.endpoint("signup"))
            .header("apikey", self.api_key.expose_secret())
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "name": name }
            }))
            .send()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        user_from_value(&body)
            .ok_or_else(|| ProviderError::Unavailable("provider returned no user".to_string()))
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
        _requested_expiry_seconds: Option<i64>,
    ) -> Result<SignInOutcome, ProviderError> {
        let response = self
            .client
            .post(self.endpoint("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", self.api_key.expose_secret())
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

            return Ok(SignInOutcome::Authenticated {
                user: token.user,
                session: ProviderSession {
                    access_token: token.access_token,
                    expires_at: token.expires_at,
                },
            });
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let (error_code, message) = error_parts(&body);

        if status.is_server_error() {
            return Err(ProviderError::Unavailable(message));
        }

        if is_email_unconfirmed(error_code.as_deref(), &message) {
            return Ok(SignInOutcome::EmailUnconfirmed);
        }

        Ok(SignInOutcome::InvalidCredentials(message))
    }

    #[instrument(skip(self, token))]
    async fn verify_email_token(&self, token: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.endpoint("verify"))
            .header("apikey", self.api_key.expose_secret())
            .json(&json!({ "token_hash": token, "type": "email" }))
            .send()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn resend_verification(&self, email: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.endpoint("resend"))
            .header("apikey", self.api_key.expose_secret())
            .json(&json!({ "email": email, "type": "signup" }))
            .send()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(())
    }

    #[instrument(skip(self, access_token))]
    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(())
    }

    #[instrument(skip(self, access_token))]
    async fn user_from_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<ProviderUser>, ProviderError> {
        let response = self
            .client
            .get(self.endpoint("user"))
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        let status = response.status();

        // The provider answers 401 for expired or malformed tokens and 400
        // for tokens it cannot parse at all. Both mean "not a session".
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || status == StatusCode::BAD_REQUEST
        {
            return Ok(None);
        }

        if !status.is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        match user_from_value(&body) {
            Some(user) => Ok(Some(user)),
            None => Err(ProviderError::Unavailable(
                "provider returned no user".to_string(),
            )),
        }
    }

    #[instrument(skip(self))]
    async fn health(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.endpoint("health"))
            .header("apikey", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "provider health returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base: &str) -> HttpIdentityProvider {
        HttpIdentityProvider::new(
            Url::parse(base).unwrap(),
            SecretString::from("test-key".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_joins_with_and_without_trailing_slash() {
        assert_eq!(
            provider("http://id.test").endpoint("signup"),
            "http://id.test/auth/v1/signup"
        );
        assert_eq!(
            provider("http://id.test/").endpoint("token"),
            "http://id.test/auth/v1/token"
        );
    }

    #[test]
    fn error_parts_reads_gotrue_shape() {
        let (code, message) = error_parts(&json!({
            "code": 400,
            "error_code": "email_not_confirmed",
            "msg": "Email not confirmed"
        }));
        assert_eq!(code.as_deref(), Some("email_not_confirmed"));
        assert_eq!(message, "Email not confirmed");
    }

    #[test]
    fn error_parts_reads_oauth_shape() {
        let (code, message) = error_parts(&json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        }));
        assert!(code.is_none());
        assert_eq!(message, "Invalid login credentials");
    }

    #[test]
    fn error_parts_reads_message_shape() {
        let (_, message) = error_parts(&json!({ "message": "not allowed" }));
        assert_eq!(message, "not allowed");
    }

    #[test]
    fn error_parts_has_a_fallback_message() {
        let (code, message) = error_parts(&Value::Null);
        assert!(code.is_none());
        assert_eq!(message, "identity provider rejected the request");
    }

    #[test]
    fn user_from_value_reads_root_and_nested_shapes() {
        let root = json!({
            "id": "b4b4b20e-3a24-4a0c-8b5a-9f2c24a3f2de",
            "email": "a@example.com"
        });
        let nested = json!({ "user": root.clone(), "access_token": "t" });

        assert_eq!(
            user_from_value(&root).unwrap().email,
            "a@example.com"
        );
        assert_eq!(
            user_from_value(&nested).unwrap().email,
            "a@example.com"
        );
        assert!(user_from_value(&json!({ "user": 42 })).is_none());
    }

    #[test]
    fn token_response_tolerates_every_expiry_shape() {
        let with_epoch: TokenResponse = serde_json::from_value(json!({
            "access_token": "t",
            "expires_at": 1_745_670_270,
            "user": { "id": "b4b4b20e-3a24-4a0c-8b5a-9f2c24a3f2de", "email": "a@example.com" }
        }))
        .unwrap();
        assert_eq!(with_epoch.expires_at, SessionExpiry::Epoch(1_745_670_270));

        let without: TokenResponse = serde_json::from_value(json!({
            "access_token": "t",
            "user": { "id": "b4b4b20e-3a24-4a0c-8b5a-9f2c24a3f2de", "email": "a@example.com" }
        }))
        .unwrap();
        assert_eq!(without.expires_at, SessionExpiry::Absent);
    }
}
