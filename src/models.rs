use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use utoipa::ToSchema;

use crate::commands::{self, CommandQueue, CommandSender, ShutdownListener, ShutdownSignal};
use crate::error::ValidationError;

/// Number of independently switchable outlets on the supported strip.
pub const OUTLET_COUNT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    On,
    Off,
    Toggle,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::On => "on",
            Operation::Off => "off",
            Operation::Toggle => "toggle",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Operation::On),
            "off" => Ok(Operation::Off),
            "toggle" => Ok(Operation::Toggle),
            _ => Err(ValidationError::InvalidOperation),
        }
    }
}

/// Outlet number on the strip, always within `0..OUTLET_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "u8")]
pub struct OutletIndex(u8);

impl TryFrom<u8> for OutletIndex {
    type Error = ValidationError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl OutletIndex {
    pub fn new(index: u8) -> Result<Self, ValidationError> {
        if index < OUTLET_COUNT {
            Ok(Self(index))
        } else {
            Err(ValidationError::SocketOutOfBounds)
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for OutletIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OutletIndex {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s.trim().parse::<i64>() {
            Ok(value) => value,
            // Well-formed integers that do not fit are still integers, just far out of range.
            Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                return Err(ValidationError::SocketOutOfBounds);
            }
            Err(_) => return Err(ValidationError::InvalidSocketNumber),
        };
        let index = u8::try_from(value).map_err(|_| ValidationError::SocketOutOfBounds)?;
        Self::new(index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub operation: Operation,
    pub outlet: OutletIndex,
}

impl Command {
    pub fn new(operation: Operation, outlet: OutletIndex) -> Self {
        Self { operation, outlet }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// True only while the worker holds a live session and a bound device.
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, ready: bool) {
        self.0.store(ready, Ordering::Release);
        metrics::gauge!("meross_ready").set(if ready { 1.0 } else { 0.0 });
    }
}

/// Everything the Control API shares with the worker loop.
#[derive(Debug)]
pub struct AppState {
    pub readiness: Readiness,
    pub commands: CommandSender,
    pub shutdown: ShutdownSignal,
}

/// The consuming ends handed to the worker loop.
#[derive(Debug)]
pub struct WorkerChannels {
    pub readiness: Readiness,
    pub queue: CommandQueue,
    pub shutdown: ShutdownListener,
}

impl AppState {
    pub fn new() -> (Self, WorkerChannels) {
        let readiness = Readiness::default();
        let (commands, queue) = commands::command_queue();
        let (shutdown, shutdown_listener) = commands::shutdown_signal();
        let state = Self {
            readiness: readiness.clone(),
            commands,
            shutdown,
        };
        let channels = WorkerChannels {
            readiness,
            queue,
            shutdown: shutdown_listener,
        };
        (state, channels)
    }
}
