//! Outbound command delivery: the transport contract, the HTTP device
//! transport, and the bounded bus feeding a single dispatcher.

mod bus;
mod http;

pub use bus::{
    CommandReceiver, CommandSender, ControlMode, Intent, IntentSource, command_bus,
    run_dispatcher, spawn_dispatcher,
};
pub use http::{DeviceConfig, HttpTransport, command_url};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::control::{ActuationCommand, CommandKind};
use crate::error::DispatchError;

/// Sends one encoded command to the vehicle.
pub trait CommandTransport: Send + Sync {
    fn send(&self, kind: CommandKind, value: u8) -> Result<(), DispatchError>;
}

impl<T: CommandTransport + ?Sized> CommandTransport for Box<T> {
    fn send(&self, kind: CommandKind, value: u8) -> Result<(), DispatchError> {
        (**self).send(kind, value)
    }
}

impl<T: CommandTransport + ?Sized> CommandTransport for Arc<T> {
    fn send(&self, kind: CommandKind, value: u8) -> Result<(), DispatchError> {
        (**self).send(kind, value)
    }
}

/// Delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub failed: u64,
}

/// Best-effort, at-most-once delivery. Failures are logged and dropped.
pub struct CommandDispatcher<T> {
    transport: T,
    stats: DispatchStats,
}

impl<T: CommandTransport> CommandDispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            stats: DispatchStats::default(),
        }
    }

    /// Send `command` once. Returns whether the device accepted it.
    pub fn dispatch(&mut self, command: ActuationCommand) -> bool {
        let (kind, value) = command.encode();
        match self.transport.send(kind, value) {
            Ok(()) => {
                self.stats.sent += 1;
                debug!(%command, "command sent");
                true
            }
            Err(err) => {
                self.stats.failed += 1;
                warn!(%command, "failed to send command: {err}");
                false
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(CommandKind, u8)>>,
        fail: bool,
    }

    impl CommandTransport for Recorder {
        fn send(&self, kind: CommandKind, value: u8) -> Result<(), DispatchError> {
            self.sent.lock().unwrap().push((kind, value));
            if self.fail {
                Err(DispatchError::Rejected("offline".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_dispatch_encodes_command() {
        let mut dispatcher = CommandDispatcher::new(Recorder::default());
        assert!(dispatcher.dispatch(ActuationCommand::TurnLeft));
        assert!(dispatcher.dispatch(ActuationCommand::Speed(180)));
        assert_eq!(
            *dispatcher.transport().sent.lock().unwrap(),
            vec![(CommandKind::MoveCar, 3), (CommandKind::Speed, 180)]
        );
        assert_eq!(dispatcher.stats(), DispatchStats { sent: 2, failed: 0 });
    }

    #[test]
    fn test_failures_are_swallowed() {
        let mut dispatcher = CommandDispatcher::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        assert!(!dispatcher.dispatch(ActuationCommand::Forward));
        assert!(!dispatcher.dispatch(ActuationCommand::Forward));
        // each command is attempted exactly once
        assert_eq!(dispatcher.transport().sent.lock().unwrap().len(), 2);
        assert_eq!(dispatcher.stats(), DispatchStats { sent: 0, failed: 2 });
    }
}
