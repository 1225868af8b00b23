// cloud/mod.rs
//! Boundary to the vendor device cloud: authentication, device discovery and
//! session release. Everything the worker needs from the cloud goes through
//! these two traits.

mod simulated;
pub use simulated::SimulatedCloud;

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::{devices::PowerStrip, error::AppError};

/// Device cloud implementations this build can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudBackend {
    /// In-process account with one strip, for demos and local testing.
    Simulated,
}

/// Builds the connector for `backend`. Nothing is picked implicitly: without
/// a configured backend startup fails.
pub fn connector_for(
    backend: Option<CloudBackend>,
    device_type: &str,
    credentials: Option<&Credentials>,
) -> Result<Arc<dyn CloudConnector>, AppError> {
    match backend {
        Some(CloudBackend::Simulated) => {
            let mut cloud = SimulatedCloud::single_strip(device_type);
            if let Some(credentials) = credentials {
                cloud = cloud.with_account(credentials.clone());
            }
            Ok(Arc::new(cloud))
        }
        None => Err(AppError::BackendNotConfigured),
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait::async_trait]
pub trait CloudConnector: Send + Sync {
    /// Opens an authenticated session against `api_base_url`.
    async fn login(
        &self,
        credentials: &Credentials,
        api_base_url: &str,
    ) -> Result<Box<dyn CloudSession>, AppError>;
}

#[async_trait::async_trait]
pub trait CloudSession: Send + Sync {
    /// Every device registered to the account, online or not.
    async fn discover_devices(&self) -> Result<Vec<Arc<dyn PowerStrip>>, AppError>;
    async fn logout(&self) -> Result<(), AppError>;
}
