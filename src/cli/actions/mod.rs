use crate::api::handlers::auth::SecondFactorPolicy;
use secrecy::SecretString;

pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        provider_url: String,
        provider_key: SecretString,
        totp_issuer: String,
        second_factor_policy: SecondFactorPolicy,
        session_ttl_days: i64,
    },
}
