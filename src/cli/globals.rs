use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub provider_url: String,
    pub provider_key: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(provider_url: String, provider_key: SecretString) -> Self {
        Self {
            provider_url,
            provider_key,
        }
    }
}
