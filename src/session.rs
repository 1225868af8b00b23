// session.rs
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    cloud::{CloudConnector, CloudSession, Credentials},
    devices::{OnlineStatus, PowerStrip},
    error::AppError,
};

/// The one device the worker operates on. Deliberately not `Clone`.
pub struct DeviceBinding {
    device: Arc<dyn PowerStrip>,
}

impl DeviceBinding {
    pub fn device(&self) -> &dyn PowerStrip {
        self.device.as_ref()
    }

    pub fn uuid(&self) -> &str {
        self.device.uuid()
    }
}

/// Owns the cloud session for a single worker run.
pub struct SessionManager {
    connector: Arc<dyn CloudConnector>,
    credentials: Option<Credentials>,
    api_base_url: String,
    device_type: String,
    session: Option<Box<dyn CloudSession>>,
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn CloudConnector>,
        credentials: Option<Credentials>,
        api_base_url: impl Into<String>,
        device_type: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            credentials,
            api_base_url: api_base_url.into(),
            device_type: device_type.into(),
            session: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub async fn initialize(&mut self) -> Result<(), AppError> {
        if self.session.is_some() {
            warn!("Session already initialised, keeping the existing one");
            return Ok(());
        }
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(AppError::MissingCredentials)?;

        info!(api_base_url = %self.api_base_url, "Logging in to device cloud");
        let session = self
            .connector
            .login(credentials, &self.api_base_url)
            .await?;
        self.session = Some(session);
        Ok(())
    }

    /// Binds the single online device of the configured type. Zero or several
    /// candidates is an error; picking one of several would be a guess.
    pub async fn discover_device(&self) -> Result<DeviceBinding, AppError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("session not initialised")))?;

        let devices = session.discover_devices().await?;
        debug!(found = devices.len(), "Device discovery finished");
        let mut matching: Vec<_> = devices
            .into_iter()
            .filter(|device| {
                device.device_type() == self.device_type
                    && device.online_status() == OnlineStatus::Online
            })
            .collect();

        match matching.len() {
            0 => Err(AppError::DeviceNotFound(self.device_type.clone())),
            1 => {
                let device = matching.remove(0);
                info!(device = device.uuid(), device_type = %self.device_type, "Device bound");
                Ok(DeviceBinding { device })
            }
            count => Err(AppError::AmbiguousDevice {
                device_type: self.device_type.clone(),
                count,
            }),
        }
    }

    /// Releases the session if one is open. Safe to call any number of times;
    /// release failures are logged and swallowed.
    pub async fn shutdown(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("No session to release");
            return;
        };
        match session.logout().await {
            Ok(()) => info!("Device cloud session released"),
            Err(e) => warn!(error = %e, "Failed to release device cloud session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::SimulatedCloud;
    use crate::devices::SimulatedPowerStrip;

    fn credentials() -> Option<Credentials> {
        Some(Credentials {
            email: "user@example.com".into(),
            password: "secret".into(),
        })
    }

    fn manager(cloud: &Arc<SimulatedCloud>) -> SessionManager {
        SessionManager::new(
            Arc::clone(cloud) as Arc<dyn CloudConnector>,
            credentials(),
            "https://iotx-eu.meross.com",
            "mss620",
        )
    }

    #[tokio::test]
    async fn binds_the_single_online_strip() {
        let cloud = Arc::new(
            SimulatedCloud::new()
                .with_device(Arc::new(SimulatedPowerStrip::new("wanted", "mss620")))
                .with_device(Arc::new(SimulatedPowerStrip::new("other-model", "mss110")))
                .with_device(Arc::new(
                    SimulatedPowerStrip::new("sleeping", "mss620").offline(),
                )),
        );
        let mut manager = manager(&cloud);

        manager.initialize().await.unwrap();
        let binding = manager.discover_device().await.unwrap();
        assert_eq!(binding.uuid(), "wanted");
    }

    #[tokio::test]
    async fn missing_credentials_never_reach_the_cloud() {
        let cloud = Arc::new(SimulatedCloud::single_strip("mss620"));
        let mut manager = SessionManager::new(
            Arc::clone(&cloud) as Arc<dyn CloudConnector>,
            None,
            "https://iotx-eu.meross.com",
            "mss620",
        );

        assert!(matches!(
            manager.initialize().await,
            Err(AppError::MissingCredentials)
        ));
        assert_eq!(cloud.logins(), 0);
        assert!(!manager.is_open());
    }

    #[tokio::test]
    async fn no_matching_device_is_not_found() {
        let cloud = Arc::new(SimulatedCloud::single_strip("mss110"));
        let mut manager = manager(&cloud);

        manager.initialize().await.unwrap();
        assert!(matches!(
            manager.discover_device().await,
            Err(AppError::DeviceNotFound(device_type)) if device_type == "mss620"
        ));
    }

    #[tokio::test]
    async fn two_matching_devices_are_ambiguous() {
        let cloud = Arc::new(
            SimulatedCloud::single_strip("mss620")
                .with_device(Arc::new(SimulatedPowerStrip::new("second", "mss620"))),
        );
        let mut manager = manager(&cloud);

        manager.initialize().await.unwrap();
        assert!(matches!(
            manager.discover_device().await,
            Err(AppError::AmbiguousDevice { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn discovery_requires_a_session() {
        let cloud = Arc::new(SimulatedCloud::single_strip("mss620"));
        let manager = manager(&cloud);
        assert!(matches!(
            manager.discover_device().await,
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let cloud = Arc::new(SimulatedCloud::single_strip("mss620"));
        let mut manager = manager(&cloud);

        manager.shutdown().await;
        assert_eq!(cloud.logouts(), 0);

        manager.initialize().await.unwrap();
        manager.shutdown().await;
        manager.shutdown().await;
        assert_eq!(cloud.logouts(), 1);
        assert!(!manager.is_open());
    }

    #[tokio::test]
    async fn failed_logout_is_swallowed() {
        let cloud = Arc::new(SimulatedCloud::single_strip("mss620").with_failing_logout());
        let mut manager = manager(&cloud);

        manager.initialize().await.unwrap();
        manager.shutdown().await;
        assert_eq!(cloud.logouts(), 1);
        assert!(!manager.is_open());
    }
}
