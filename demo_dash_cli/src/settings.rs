use crate::error::AppError;
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "DEMO_DASH";

/// Process-level settings: where to listen and where the dashboard config
/// lives. Read from an optional `server.toml` next to the binary, then
/// overridden by `DEMO_DASH_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_config_path")]
    pub config_path: String,
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

impl ServerSettings {
    pub fn load() -> Result<Self, AppError> {
        Self::from_sources("server", ENV_PREFIX)
    }

    fn from_sources(file: &str, env_prefix: &str) -> Result<Self, AppError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix(env_prefix).try_parsing(true))
            .build()?;
        let settings: ServerSettings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.config_path.trim().is_empty() {
            return Err(demo_dash_core::CoreError::Validation(
                "config_path must not be empty".to_string(),
            )
            .into());
        }
        if self.rpc_timeout_secs == 0 {
            return Err(demo_dash_core::CoreError::Validation(
                "rpc_timeout_secs must be > 0".to_string(),
            )
            .into());
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5001 }
fn default_config_path() -> String { "config.json".to_string() }
fn default_rpc_timeout_secs() -> u64 { 10 }
