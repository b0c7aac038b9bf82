//! Command bus: operator and automatic intents share one bounded queue and
//! one dispatcher, so the device sees a single ordered command stream.
//!
//! `CommandSender::close` ends the stream with a final command. Anything
//! submitted afterwards is refused, even by senders that are still alive.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, info, warn};

use super::{CommandDispatcher, CommandTransport, DispatchStats};
use crate::control::ActuationCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    /// Operator console
    Manual,
    /// Centering controller
    Auto,
}

/// A command waiting to be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    pub source: IntentSource,
    pub command: ActuationCommand,
    /// Frame that produced an automatic command
    pub frame: Option<u64>,
}

impl Intent {
    pub fn manual(command: ActuationCommand) -> Self {
        Self {
            source: IntentSource::Manual,
            command,
            frame: None,
        }
    }

    pub fn auto(command: ActuationCommand, frame: u64) -> Self {
        Self {
            source: IntentSource::Auto,
            command,
            frame: Some(frame),
        }
    }
}

enum Message {
    Intent(Intent),
    Close,
}

/// Producer side of the bus. `submit` never blocks.
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<Message>,
    closed: Arc<AtomicBool>,
}

impl CommandSender {
    /// Queue `intent`. Returns `false` if it was dropped because the bus is
    /// full, closed, or the dispatcher has gone.
    pub fn submit(&self, intent: Intent) -> bool {
        if self.is_closed() {
            debug!(command = %intent.command, "command bus closed, dropping command");
            return false;
        }
        match self.tx.try_send(Message::Intent(intent)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(command = %intent.command, source = ?intent.source, "command bus full, dropping command");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(command = %intent.command, "dispatcher stopped, dropping command");
                false
            }
        }
    }

    /// Refuse further submissions, queue `last` behind everything already
    /// pending and tell the dispatcher to finish after it.
    ///
    /// Blocks while the bus is full. Returns `false` if the bus was already
    /// closed or the dispatcher has gone.
    pub fn close(&self, last: Intent) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!(command = %last.command, "closing command bus");
        self.tx.send(Message::Intent(last)).is_ok() && self.tx.send(Message::Close).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

pub struct CommandReceiver {
    rx: Receiver<Message>,
}

/// Bounded bus holding at most `capacity` pending commands.
pub fn command_bus(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    let sender = CommandSender {
        tx,
        closed: Arc::new(AtomicBool::new(false)),
    };
    (sender, CommandReceiver { rx })
}

/// Drain the bus until it is closed or every sender is dropped.
pub fn run_dispatcher<T: CommandTransport>(
    receiver: CommandReceiver,
    mut dispatcher: CommandDispatcher<T>,
) -> DispatchStats {
    for message in receiver.rx.iter() {
        let Message::Intent(intent) = message else {
            break;
        };
        debug!(command = %intent.command, source = ?intent.source, frame = ?intent.frame, "dispatching");
        dispatcher.dispatch(intent.command);
    }
    let stats = dispatcher.stats();
    info!(sent = stats.sent, failed = stats.failed, "dispatcher finished");
    stats
}

/// Run the dispatcher on its own thread.
pub fn spawn_dispatcher<T: CommandTransport + 'static>(
    receiver: CommandReceiver,
    dispatcher: CommandDispatcher<T>,
) -> io::Result<JoinHandle<DispatchStats>> {
    thread::Builder::new()
        .name("dispatch".into())
        .spawn(move || run_dispatcher(receiver, dispatcher))
}

/// Whether the centering controller may issue commands. Shared between the
/// pipeline and the operator.
#[derive(Debug, Clone)]
pub struct ControlMode {
    auto: Arc<AtomicBool>,
}

impl ControlMode {
    pub fn new(auto: bool) -> Self {
        Self {
            auto: Arc::new(AtomicBool::new(auto)),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.auto.load(Ordering::Relaxed)
    }

    pub fn set_auto(&self, auto: bool) {
        self.auto.store(auto, Ordering::Relaxed);
    }

    /// Flip the mode and return the new value.
    pub fn toggle(&self) -> bool {
        !self.auto.fetch_xor(true, Ordering::Relaxed)
    }
}

impl Default for ControlMode {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CommandKind;
    use crate::error::DispatchError;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(CommandKind, u8)>>, Duration);

    impl CommandTransport for Recorder {
        fn send(&self, kind: CommandKind, value: u8) -> Result<(), DispatchError> {
            thread::sleep(self.1);
            self.0.lock().unwrap().push((kind, value));
            Ok(())
        }
    }

    #[test]
    fn test_full_bus_drops_without_blocking() {
        let (sender, _receiver) = command_bus(2);
        assert!(sender.submit(Intent::manual(ActuationCommand::Forward)));
        assert!(sender.submit(Intent::manual(ActuationCommand::Forward)));
        assert!(!sender.submit(Intent::manual(ActuationCommand::Stop)));
    }

    #[test]
    fn test_disconnected_bus_drops() {
        let (sender, receiver) = command_bus(2);
        drop(receiver);
        assert!(!sender.submit(Intent::auto(ActuationCommand::Stop, 3)));
    }

    #[test]
    fn test_dispatcher_preserves_order_across_sources() {
        let (sender, receiver) = command_bus(8);
        let transport = Arc::new(Recorder::default());
        let handle = spawn_dispatcher(receiver, CommandDispatcher::new(Arc::clone(&transport))).unwrap();

        sender.submit(Intent::manual(ActuationCommand::Light(50)));
        sender.submit(Intent::auto(ActuationCommand::TurnRight, 1));
        sender.submit(Intent::manual(ActuationCommand::Stop));
        drop(sender);

        let stats = handle.join().unwrap();
        assert_eq!(stats, DispatchStats { sent: 3, failed: 0 });
        assert_eq!(
            *transport.0.lock().unwrap(),
            vec![
                (CommandKind::Light, 50),
                (CommandKind::MoveCar, 4),
                (CommandKind::MoveCar, 0)
            ]
        );
    }

    #[test]
    fn test_close_puts_last_command_after_pending_ones() {
        let (sender, receiver) = command_bus(8);
        // a slow device keeps motion commands queued while closing
        let transport = Arc::new(Recorder(Mutex::default(), Duration::from_millis(30)));
        let handle = spawn_dispatcher(receiver, CommandDispatcher::new(Arc::clone(&transport))).unwrap();
        let console = sender.clone();

        for frame in 0..4 {
            assert!(sender.submit(Intent::auto(ActuationCommand::Forward, frame)));
        }
        assert!(sender.close(Intent::manual(ActuationCommand::Stop)));
        assert!(!console.submit(Intent::manual(ActuationCommand::Forward)));
        assert!(!sender.close(Intent::manual(ActuationCommand::Stop)));

        // returns although `console` still holds a sender
        let stats = handle.join().unwrap();
        assert_eq!(stats.sent, 5);
        let sent = transport.0.lock().unwrap();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent.last(), Some(&(CommandKind::MoveCar, 0)));
        assert!(console.is_closed());
    }

    #[test]
    fn test_control_mode_toggle() {
        let mode = ControlMode::default();
        let shared = mode.clone();
        assert!(shared.is_auto());
        assert!(!mode.toggle());
        assert!(!shared.is_auto());
        shared.set_auto(true);
        assert!(mode.is_auto());
    }
}
