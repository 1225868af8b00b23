// commands/mod.rs
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::{
    devices::PowerStrip,
    error::AppError,
    models::{Command, Operation},
};

/// Producer side of the command queue. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct CommandSender(mpsc::UnboundedSender<Command>);

/// Consumer side of the command queue, owned by the worker loop.
#[derive(Debug)]
pub struct CommandQueue(mpsc::UnboundedReceiver<Command>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dequeued {
    Command(Command),
    /// Nothing arrived before the timeout.
    Idle,
    /// Every sender is gone and the queue is drained.
    Closed,
}

pub fn command_queue() -> (CommandSender, CommandQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender(tx), CommandQueue(rx))
}

impl CommandSender {
    pub fn enqueue(&self, command: Command) -> Result<(), AppError> {
        self.0.send(command).map_err(|_| AppError::QueueClosed)
    }
}

impl CommandQueue {
    pub async fn dequeue(&mut self, timeout: Duration) -> Dequeued {
        match tokio::time::timeout(timeout, self.0.recv()).await {
            Ok(Some(command)) => Dequeued::Command(command),
            Ok(None) => Dequeued::Closed,
            Err(_) => Dequeued::Idle,
        }
    }

    /// Commands still waiting in the queue.
    pub fn pending(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug)]
pub struct ShutdownSignal(watch::Sender<bool>);

#[derive(Debug, Clone)]
pub struct ShutdownListener(watch::Receiver<bool>);

pub fn shutdown_signal() -> (ShutdownSignal, ShutdownListener) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSignal(tx), ShutdownListener(rx))
}

impl ShutdownSignal {
    pub fn request(&self) {
        self.0.send_replace(true);
    }
}

impl ShutdownListener {
    /// A dropped signal counts as a request: nobody is left to send one.
    pub fn is_requested(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    pub async fn requested(&mut self) {
        let _ = self.0.wait_for(|requested| *requested).await;
    }
}

/// Applies one command to the bound device. The device state is refreshed
/// first since the cached on/off values may be stale.
pub async fn apply(command: Command, device: &dyn PowerStrip) -> Result<(), AppError> {
    device.update().await?;
    match command.operation {
        Operation::On => device.turn_on(command.outlet).await,
        Operation::Off => device.turn_off(command.outlet).await,
        Operation::Toggle => {
            if device.is_on(command.outlet).await? {
                device.turn_off(command.outlet).await
            } else {
                device.turn_on(command.outlet).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{SimulatedPowerStrip, StripCall};
    use crate::models::OutletIndex;

    fn command(operation: Operation, outlet: u8) -> Command {
        Command::new(operation, OutletIndex::new(outlet).unwrap())
    }

    #[tokio::test]
    async fn dequeue_preserves_fifo_order_across_producers() {
        let (tx, mut queue) = command_queue();
        let other = tx.clone();
        tx.enqueue(command(Operation::On, 0)).unwrap();
        other.enqueue(command(Operation::Off, 1)).unwrap();
        tx.enqueue(command(Operation::Toggle, 0)).unwrap();
        assert_eq!(queue.pending(), 3);

        let timeout = Duration::from_millis(50);
        assert_eq!(
            queue.dequeue(timeout).await,
            Dequeued::Command(command(Operation::On, 0))
        );
        assert_eq!(
            queue.dequeue(timeout).await,
            Dequeued::Command(command(Operation::Off, 1))
        );
        assert_eq!(
            queue.dequeue(timeout).await,
            Dequeued::Command(command(Operation::Toggle, 0))
        );
    }

    #[tokio::test]
    async fn dequeue_times_out_when_idle() {
        let (_tx, mut queue) = command_queue();
        assert_eq!(
            queue.dequeue(Duration::from_millis(20)).await,
            Dequeued::Idle
        );
    }

    #[tokio::test]
    async fn dequeue_drains_before_reporting_closed() {
        let (tx, mut queue) = command_queue();
        tx.enqueue(command(Operation::On, 1)).unwrap();
        drop(tx);

        let timeout = Duration::from_millis(20);
        assert_eq!(
            queue.dequeue(timeout).await,
            Dequeued::Command(command(Operation::On, 1))
        );
        assert_eq!(queue.dequeue(timeout).await, Dequeued::Closed);
    }

    #[test]
    fn enqueue_fails_once_queue_is_gone() {
        let (tx, queue) = command_queue();
        drop(queue);
        assert!(matches!(
            tx.enqueue(command(Operation::Off, 0)),
            Err(AppError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn shutdown_request_is_sticky() {
        let (signal, mut listener) = shutdown_signal();
        assert!(!listener.is_requested());

        signal.request();
        signal.request();
        assert!(listener.is_requested());
        listener.requested().await;
        assert!(listener.is_requested());
    }

    #[tokio::test]
    async fn dropped_shutdown_signal_counts_as_request() {
        let (signal, mut listener) = shutdown_signal();
        drop(signal);
        assert!(listener.is_requested());
        listener.requested().await;
    }

    #[tokio::test]
    async fn toggle_reads_refreshed_state() {
        let strip = SimulatedPowerStrip::new("strip-1", "mss620");
        let outlet = OutletIndex::new(1).unwrap();
        strip.press(outlet, true).await;

        apply(command(Operation::Toggle, 1), &strip).await.unwrap();

        assert_eq!(strip.remote_state(outlet).await, Some(false));
        assert_eq!(
            strip.calls().await,
            vec![StripCall::Update, StripCall::TurnOff(1)]
        );
    }

    #[tokio::test]
    async fn on_then_toggle_turns_outlet_back_off() {
        let strip = SimulatedPowerStrip::new("strip-1", "mss620");
        let outlet = OutletIndex::new(1).unwrap();

        apply(command(Operation::On, 1), &strip).await.unwrap();
        assert_eq!(strip.remote_state(outlet).await, Some(true));
        apply(command(Operation::Toggle, 1), &strip).await.unwrap();

        assert_eq!(strip.remote_state(outlet).await, Some(false));
        assert_eq!(
            strip.calls().await,
            vec![
                StripCall::Update,
                StripCall::TurnOn(1),
                StripCall::Update,
                StripCall::TurnOff(1),
            ]
        );
    }

    #[tokio::test]
    async fn failed_refresh_skips_the_operation() {
        let strip = SimulatedPowerStrip::new("strip-1", "mss620").with_failing_updates();

        let result = apply(command(Operation::On, 0), &strip).await;

        assert!(matches!(result, Err(AppError::Device(_))));
        assert_eq!(strip.calls().await, vec![StripCall::Update]);
    }
}
