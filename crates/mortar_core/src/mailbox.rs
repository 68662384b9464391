//! Coalescing single-slot mailboxes
//!
//! A [`Mailbox`] holds at most one pending value. Stacking onto a mailbox that
//! already holds a value merges the two with [`Coalesce`], so a producer never
//! waits on a slow consumer and the consumer always sees the latest state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Merge policy for values stacked onto a [`Mailbox`]
pub trait Coalesce: Sized {
    /// Merge a newer value into the pending one
    fn coalesce(self, newer: Self) -> Self;
}

struct Slot<T> {
    value: Mutex<Option<T>>,
    notify: Notify,
    closed: AtomicBool,
}

/// Single-slot coalescing channel.
///
/// Clones share the same slot.
pub struct Mailbox<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("pending", &self.is_pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Slot {
                value: Mutex::new(None),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Take the pending value without waiting
    pub fn try_recv(&self) -> Option<T> {
        self.slot.value.lock().take()
    }

    /// Wait for a value.
    ///
    /// Returns `None` once the mailbox is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        loop {
            let notified = self.slot.notify.notified();
            if let Some(value) = self.try_recv() {
                return Some(value);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    /// Close the mailbox. Later stacks are discarded and waiting receivers
    /// return once the slot is drained.
    pub fn close(&self) {
        self.slot.closed.store(true, Ordering::SeqCst);
        self.slot.notify.notify_waiters();
        self.slot.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.closed.load(Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.slot.value.lock().is_some()
    }
}

impl<T: Coalesce> Mailbox<T> {
    /// Deposit a value, merging it with any pending one. Never blocks.
    pub fn stack(&self, value: T) {
        if self.is_closed() {
            return;
        }
        {
            let mut slot = self.slot.value.lock();
            let merged = match slot.take() {
                Some(pending) => pending.coalesce(value),
                None => value,
            };
            *slot = Some(merged);
        }
        self.slot.notify.notify_one();
    }
}
