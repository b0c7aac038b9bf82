//! Single-slot overwrite channel: the producer never blocks and the
//! consumer only ever sees the newest value.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};

pub struct SlotSender<T> {
    tx: Sender<T>,
    // used to evict the stale value when the slot is occupied
    evict: Receiver<T>,
}

pub struct SlotReceiver<T> {
    rx: Receiver<T>,
}

pub fn latest_slot<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    let (tx, rx) = bounded(1);
    (
        SlotSender {
            tx,
            evict: rx.clone(),
        },
        SlotReceiver { rx },
    )
}

impl<T> SlotSender<T> {
    /// Store `value`, replacing anything the consumer has not taken yet.
    /// Returns `true` if a stale value was replaced.
    pub fn publish(&self, mut value: T) -> bool {
        let mut replaced = false;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return replaced,
                Err(TrySendError::Full(back)) => {
                    replaced |= self.evict.try_recv().is_ok();
                    value = back;
                }
                // unreachable while `evict` is alive
                Err(TrySendError::Disconnected(_)) => return replaced,
            }
        }
    }
}

impl<T> SlotReceiver<T> {
    /// Wait for the next value. `None` once the sender is gone and the slot
    /// is empty.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_consumer_sees_latest_only() {
        let (tx, rx) = latest_slot();
        assert!(!tx.publish(1));
        assert!(tx.publish(2));
        assert!(tx.publish(3));
        assert_eq!(rx.try_recv(), Some(3));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_publish_never_blocks_without_consumer() {
        let (tx, rx) = latest_slot();
        drop(rx);
        for i in 0..100 {
            tx.publish(i);
        }
    }

    #[test]
    fn test_receiver_ends_after_sender_drop() {
        let (tx, rx) = latest_slot();
        let producer = thread::spawn(move || {
            tx.publish("last");
        });
        producer.join().unwrap();
        assert_eq!(rx.recv(), Some("last"));
        assert_eq!(rx.recv(), None);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(1)),
            Err(RecvTimeoutError::Disconnected)
        );
    }
}
