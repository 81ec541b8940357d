//! Client credentials and identity, supplied out-of-band via the
//! environment.

use std::env;

use crate::error::ConfigError;

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USER_AGENT: &str = "CHATTERMILL_USER_AGENT";

#[derive(Debug, Clone)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl Settings {
    /// Reads credentials from the environment. The user agent falls back to
    /// the crate name and version if unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: require(ENV_CLIENT_ID)?,
            client_secret: require(ENV_CLIENT_SECRET)?,
            user_agent: env::var(ENV_USER_AGENT)
                .unwrap_or_else(|_| concat!("chattermill/", env!("CARGO_PKG_VERSION")).to_string()),
        })
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVar(key))
}
