use crate::api;
use crate::api::handlers::auth::AuthConfig;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            provider_url,
            provider_key,
            totp_issuer,
            second_factor_policy,
            session_ttl_days,
        } => {
            let dsn = Url::parse(&dsn)?;

            let globals = GlobalArgs::new(provider_url, provider_key);

            let config = AuthConfig::new()
                .with_totp_issuer(totp_issuer)
                .with_second_factor_policy(second_factor_policy)
                .with_session_ttl_seconds(session_ttl_days * 24 * 60 * 60);

            api::new(port, dsn.to_string(), &globals, config).await?;
        }
    }

    Ok(())
}
