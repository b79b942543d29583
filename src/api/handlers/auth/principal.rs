//! Authenticated principal extraction.
//!
//! Every protected endpoint resolves the bearer token against the identity
//! provider before touching anything else. Failures come back already shaped
//! as envelope responses.

use axum::http::HeaderMap;
use tracing::error;

use crate::api::response::ApiResponse;
use crate::provider::{IdentityProvider, ProviderUser};

use super::session::extract_bearer_token;

/// Authenticated caller context derived from the bearer token.
#[derive(Debug)]
pub struct Principal {
    pub user: ProviderUser,
    pub access_token: String,
}

/// Resolve the bearer token into a principal, or the envelope to send back.
pub(super) async fn require_user(
    headers: &HeaderMap,
    provider: &dyn IdentityProvider,
) -> Result<Principal, ApiResponse> {
    let Some(access_token) = extract_bearer_token(headers) else {
        return Err(ApiResponse::unauthorized(
            4010,
            "Authorization token is required",
        ));
    };

    match provider.user_from_access_token(&access_token).await {
        Ok(Some(user)) => Ok(Principal { user, access_token }),
        Ok(None) => Err(ApiResponse::unauthorized(4011, "Invalid or expired token")),
        Err(err) => {
            error!("Failed to authenticate token: {err}");
            Err(ApiResponse::server_error(
                5010,
                "Server error during authentication",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use crate::provider::SignInOutcome;
    use axum::http::{header::AUTHORIZATION, HeaderValue};

    async fn signed_in_provider() -> (MockProvider, String) {
        let provider = MockProvider::new();
        provider
            .sign_up("a@example.com", "hunter22", "A")
            .await
            .unwrap();
        provider.confirm("a@example.com").await;
        let outcome = provider
            .sign_in_with_password("a@example.com", "hunter22", None)
            .await
            .unwrap();
        let SignInOutcome::Authenticated { session, .. } = outcome else {
            panic!("expected a session");
        };
        (provider, session.access_token)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn missing_header_is_4010() {
        let provider = MockProvider::new();
        let err = require_user(&HeaderMap::new(), &provider).await.unwrap_err();
        assert_eq!(err.code, 4010);
        assert_eq!(err.http_status, 401);
    }

    #[tokio::test]
    async fn unknown_token_is_4011() {
        let provider = MockProvider::new();
        let err = require_user(&bearer("nope"), &provider).await.unwrap_err();
        assert_eq!(err.code, 4011);
        assert_eq!(err.http_status, 401);
    }

    #[tokio::test]
    async fn valid_token_resolves_the_user() {
        let (provider, token) = signed_in_provider().await;
        let principal = require_user(&bearer(&token), &provider).await.unwrap();
        assert_eq!(principal.user.email, "a@example.com");
        assert_eq!(principal.access_token, token);
    }

    #[tokio::test]
    async fn provider_outage_is_5010() {
        let (provider, token) = signed_in_provider().await;
        provider.set_unavailable(true);
        let err = require_user(&bearer(&token), &provider).await.unwrap_err();
        assert_eq!(err.code, 5010);
        assert_eq!(err.http_status, 500);
    }
}
