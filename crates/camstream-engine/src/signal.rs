//! Replay-latest observable cells.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

/// A value that observers can subscribe to.
///
/// A new subscriber immediately receives the current value, then every
/// subsequent publication in order. Cloning a `Signal` yields another handle
/// to the same cell.
pub struct Signal<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
}

struct Slot<T> {
    value: T,
    next_id: u64,
    subscribers: Vec<(u64, Sender<T>)>,
}

impl<T: Clone + Send + 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    value,
                    next_id: 0,
                    subscribers: Vec::new(),
                }),
            }),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.inner.slot.lock().value.clone()
    }

    /// Store and publish a value, even if equal to the current one.
    pub fn set(&self, value: T) {
        let mut slot = self.inner.slot.lock();
        slot.value = value.clone();
        slot.subscribers
            .retain(|(_, subscriber)| subscriber.send(value.clone()).is_ok());
    }

    /// Store and publish a value only if it differs from the current one.
    /// Returns whether anything was published.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        let mut slot = self.inner.slot.lock();
        if slot.value == value {
            return false;
        }
        slot.value = value.clone();
        slot.subscribers
            .retain(|(_, subscriber)| subscriber.send(value.clone()).is_ok());
        true
    }

    /// Attach an observer. The current value is delivered first.
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = crossbeam_channel::unbounded();

        let mut slot = self.inner.slot.lock();
        let id = slot.next_id;
        slot.next_id += 1;
        // The receiver is alive, so this cannot fail.
        let _ = sender.send(slot.value.clone());
        slot.subscribers.push((id, sender));

        Subscription {
            id,
            receiver,
            signal: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.slot.lock().subscribers.len()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// An attached observer of a [`Signal`]. Dropping it detaches.
pub struct Subscription<T> {
    id: u64,
    receiver: Receiver<T>,
    signal: Weak<Inner<T>>,
}

impl<T> Subscription<T> {
    /// Block until the next value. `None` once the signal is gone and
    /// everything queued has been read.
    pub fn recv(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Everything queued so far.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Underlying channel, for use with `crossbeam_channel::select!`.
    pub fn receiver(&self) -> &Receiver<T> {
        &self.receiver
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.signal.upgrade() {
            inner
                .slot
                .lock()
                .subscribers
                .retain(|(id, _)| *id != self.id);
        }
    }
}
