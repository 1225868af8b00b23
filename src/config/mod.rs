// config/mod.rs
use config::{Config, ConfigBuilder, builder::DefaultState};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::cloud::{CloudBackend, Credentials};

pub const DEFAULT_API_BASE_URL: &str = "https://iotx-eu.meross.com";

#[derive(Debug, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub server: ServerSettings,
    #[validate(nested)]
    pub metrics: MetricsSettings,
    #[validate(nested)]
    pub meross: MerossSettings,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ServerSettings {
    #[validate(length(min = 1))]
    pub address: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MetricsSettings {
    pub enabled: bool,
    #[validate(range(min = 1))]
    pub port: u16,
}

#[derive(Deserialize, Validate)]
pub struct MerossSettings {
    /// Unset means no backend; startup refuses to continue.
    pub backend: Option<CloudBackend>,
    #[validate(email)]
    pub email: Option<String>,
    pub password: Option<String>,
    #[validate(url)]
    pub api_base_url: String,
    #[validate(length(min = 1))]
    pub device_type: String,
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,
    pub secrets_dir: String,
}

impl std::fmt::Debug for MerossSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerossSettings")
            .field("backend", &self.backend)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("device_type", &self.device_type)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("secrets_dir", &self.secrets_dir)
            .finish()
    }
}

impl Settings {
    pub fn new() -> anyhow::Result<Self> {
        let builder = Self::defaults()?
            .add_source(config::File::with_name("config/config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        Self::from_builder(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        Config::builder()
            .set_default("server.address", "0.0.0.0:5000")?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.port", 9000)?
            .set_default("meross.api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("meross.device_type", "mss620")?
            .set_default("meross.poll_interval_ms", 1000)?
            .set_default("meross.secrets_dir", "/run/secrets")
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.meross.fill_from_secrets();
        settings.validate()?;
        Ok(settings)
    }
}

impl MerossSettings {
    /// Fills unset credentials from `meross_email` / `meross_password` files
    /// in the secrets directory.
    fn fill_from_secrets(&mut self) {
        let dir = Path::new(&self.secrets_dir);
        if self.email.is_none() {
            self.email = read_secret(dir, "meross_email");
        }
        if self.password.is_none() {
            self.password = read_secret(dir, "meross_password");
        }
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some(Credentials {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn read_secret(dir: &Path, name: &str) -> Option<String> {
    let value = std::fs::read_to_string(dir.join(name)).ok()?;
    let value = value.trim_end();
    (!value.is_empty()).then(|| value.to_string())
}
