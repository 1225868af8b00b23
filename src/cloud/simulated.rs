// simulated.rs
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::{CloudConnector, CloudSession, Credentials};
use crate::{
    devices::{PowerStrip, SimulatedPowerStrip},
    error::AppError,
};

/// Cloud account living inside the process, backed by simulated strips.
#[derive(Debug, Default)]
pub struct SimulatedCloud {
    account: Option<Credentials>,
    unreachable: bool,
    failing_logout: bool,
    devices: Vec<Arc<SimulatedPowerStrip>>,
    logins: AtomicUsize,
    logouts: Arc<AtomicUsize>,
}

impl SimulatedCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// An account with one online strip of `device_type`.
    pub fn single_strip(device_type: &str) -> Self {
        Self::new().with_device(Arc::new(SimulatedPowerStrip::new(
            "simulated-strip-0",
            device_type,
        )))
    }

    pub fn with_device(mut self, device: Arc<SimulatedPowerStrip>) -> Self {
        self.devices.push(device);
        self
    }

    /// Only these credentials are accepted; without it any non-empty pair is.
    pub fn with_account(mut self, credentials: Credentials) -> Self {
        self.account = Some(credentials);
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn with_failing_logout(mut self) -> Self {
        self.failing_logout = true;
        self
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudConnector for SimulatedCloud {
    async fn login(
        &self,
        credentials: &Credentials,
        api_base_url: &str,
    ) -> Result<Box<dyn CloudSession>, AppError> {
        if self.unreachable {
            return Err(AppError::Connectivity(format!(
                "{api_base_url} did not respond"
            )));
        }
        if credentials.email.is_empty() || credentials.password.is_empty() {
            return Err(AppError::Authentication("empty email or password".into()));
        }
        if let Some(account) = &self.account {
            if account != credentials {
                return Err(AppError::Authentication("invalid email or password".into()));
            }
        }

        self.logins.fetch_add(1, Ordering::SeqCst);
        debug!(email = %credentials.email, api_base_url, "Simulated login");
        Ok(Box::new(SimulatedSession {
            devices: self.devices.clone(),
            failing_logout: self.failing_logout,
            logouts: Arc::clone(&self.logouts),
        }))
    }
}

struct SimulatedSession {
    devices: Vec<Arc<SimulatedPowerStrip>>,
    failing_logout: bool,
    logouts: Arc<AtomicUsize>,
}

#[async_trait]
impl CloudSession for SimulatedSession {
    async fn discover_devices(&self) -> Result<Vec<Arc<dyn PowerStrip>>, AppError> {
        Ok(self
            .devices
            .iter()
            .map(|device| Arc::clone(device) as Arc<dyn PowerStrip>)
            .collect())
    }

    async fn logout(&self) -> Result<(), AppError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        if self.failing_logout {
            return Err(AppError::Connectivity("logout request failed".into()));
        }
        Ok(())
    }
}
