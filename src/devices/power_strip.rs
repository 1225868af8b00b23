// power_strip.rs
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use tokio::sync::{Mutex, RwLock};

use super::OnlineStatus;
use crate::{
    error::AppError,
    models::{OUTLET_COUNT, OutletIndex},
};

/// Most recent calls kept in the journal.
pub const JOURNAL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripCall {
    Update,
    TurnOn(u8),
    TurnOff(u8),
}

/// In-process strip. `remote` is what the hardware would report, `cached` is
/// the view the handle last fetched.
#[derive(Debug)]
pub struct SimulatedPowerStrip {
    uuid: String,
    device_type: String,
    online: OnlineStatus,
    remote: RwLock<Vec<bool>>,
    cached: RwLock<Vec<bool>>,
    failing_outlets: HashSet<u8>,
    failing_updates: bool,
    journal: Mutex<VecDeque<StripCall>>,
}

impl SimulatedPowerStrip {
    pub fn new(uuid: impl Into<String>, device_type: impl Into<String>) -> Self {
        let outlets = usize::from(OUTLET_COUNT);
        Self {
            uuid: uuid.into(),
            device_type: device_type.into(),
            online: OnlineStatus::Online,
            remote: RwLock::new(vec![false; outlets]),
            cached: RwLock::new(vec![false; outlets]),
            failing_outlets: HashSet::new(),
            failing_updates: false,
            journal: Mutex::new(VecDeque::with_capacity(JOURNAL_CAPACITY)),
        }
    }

    pub fn offline(mut self) -> Self {
        self.online = OnlineStatus::Offline;
        self
    }

    /// Every on/off attempt against `outlet` fails.
    pub fn with_failing_outlet(mut self, outlet: OutletIndex) -> Self {
        self.failing_outlets.insert(outlet.get());
        self
    }

    /// Every state refresh fails.
    pub fn with_failing_updates(mut self) -> Self {
        self.failing_updates = true;
        self
    }

    /// Changes the device state behind the handle's back, like a button press on the strip.
    pub async fn press(&self, outlet: OutletIndex, on: bool) {
        if let Some(slot) = self.remote.write().await.get_mut(usize::from(outlet.get())) {
            *slot = on;
        }
    }

    pub async fn remote_state(&self, outlet: OutletIndex) -> Option<bool> {
        self.remote
            .read()
            .await
            .get(usize::from(outlet.get()))
            .copied()
    }

    /// The last `JOURNAL_CAPACITY` calls, oldest first.
    pub async fn calls(&self) -> Vec<StripCall> {
        self.journal.lock().await.iter().copied().collect()
    }

    async fn record(&self, call: StripCall) {
        let mut journal = self.journal.lock().await;
        if journal.len() == JOURNAL_CAPACITY {
            journal.pop_front();
        }
        journal.push_back(call);
    }

    async fn set(&self, outlet: OutletIndex, on: bool) -> Result<(), AppError> {
        let index = outlet.get();
        self.record(if on {
            StripCall::TurnOn(index)
        } else {
            StripCall::TurnOff(index)
        })
        .await;

        if self.online == OnlineStatus::Offline {
            return Err(AppError::Device(format!("{} is offline", self.uuid)));
        }
        if self.failing_outlets.contains(&index) {
            return Err(AppError::Device(format!(
                "{} rejected command for outlet {}",
                self.uuid, index
            )));
        }

        let slot = usize::from(index);
        let mut remote = self.remote.write().await;
        *remote.get_mut(slot).ok_or(AppError::InvalidChannel(index))? = on;
        if let Some(cached) = self.cached.write().await.get_mut(slot) {
            *cached = on;
        }
        Ok(())
    }
}

#[async_trait]
impl super::PowerStrip for SimulatedPowerStrip {
    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn device_type(&self) -> &str {
        &self.device_type
    }

    fn online_status(&self) -> OnlineStatus {
        self.online
    }

    async fn update(&self) -> Result<(), AppError> {
        self.record(StripCall::Update).await;
        if self.failing_updates || self.online == OnlineStatus::Offline {
            return Err(AppError::Device(format!(
                "{} did not answer the state query",
                self.uuid
            )));
        }
        let remote = self.remote.read().await.clone();
        *self.cached.write().await = remote;
        Ok(())
    }

    async fn is_on(&self, outlet: OutletIndex) -> Result<bool, AppError> {
        self.cached
            .read()
            .await
            .get(usize::from(outlet.get()))
            .copied()
            .ok_or(AppError::InvalidChannel(outlet.get()))
    }

    async fn turn_on(&self, outlet: OutletIndex) -> Result<(), AppError> {
        self.set(outlet, true).await
    }

    async fn turn_off(&self, outlet: OutletIndex) -> Result<(), AppError> {
        self.set(outlet, false).await
    }
}
