// devices/mod.rs
mod power_strip;
pub use power_strip::{JOURNAL_CAPACITY, SimulatedPowerStrip, StripCall};

use crate::{error::AppError, models::OutletIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlineStatus {
    Online,
    Offline,
}

/// Handle to a multi-outlet strip reachable through a cloud session.
///
/// `is_on` answers from the locally known state; call `update` first when
/// the answer has to reflect the device.
#[async_trait::async_trait]
pub trait PowerStrip: Send + Sync {
    fn uuid(&self) -> &str;
    fn device_type(&self) -> &str;
    fn online_status(&self) -> OnlineStatus;
    async fn update(&self) -> Result<(), AppError>;
    async fn is_on(&self, outlet: OutletIndex) -> Result<bool, AppError>;
    async fn turn_on(&self, outlet: OutletIndex) -> Result<(), AppError>;
    async fn turn_off(&self, outlet: OutletIndex) -> Result<(), AppError>;
}
