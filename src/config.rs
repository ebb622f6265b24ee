//! Environment-based configuration.

use serde::Deserialize;

pub use config::ConfigError;

/// Process-wide configuration. Read once at startup, never mutated.
///
/// | Variable | Required | Description |
/// |----------|----------|-------------|
/// | `APP_SECRET` | Yes | Application secret the vault derives its key from |
/// | `TRACKING_BASE_URL` | Yes | Public base URL for tracking endpoints |
/// | `SUBMISSION_URL` | Yes | Downstream message-submission endpoint |
/// | `PORT` | No | Listen port (default: 8080) |
#[derive(Clone, Deserialize)]
pub struct Config {
    pub app_secret: String,
    pub tracking_base_url: String,
    pub submission_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }
}

fn default_port() -> u16 {
    8080
}
