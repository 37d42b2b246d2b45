use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::trace;

#[derive(Debug)]
struct Slot<T> {
    pending: Option<T>,
    skipped: u64,
    closed: bool,
}

/// Latest-value handoff between one producer and one consumer.
///
/// Holds at most one unread value. A write that lands while a value is still
/// pending replaces it and counts a skip; nothing is ever queued.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    notify: Notify,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                pending: None,
                skipped: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        // The slot is always left consistent, so a poisoned lock is still usable.
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores `value`, replacing any unread one. Never waits.
    ///
    /// Returns `true` if an unread value was overwritten.
    pub fn write(&self, value: T) -> bool {
        let replaced = {
            let mut slot = self.lock();
            let replaced = slot.pending.replace(value).is_some();
            if replaced {
                slot.skipped += 1;
                trace!(skipped = slot.skipped, "overwrote unread value");
            }
            replaced
        };
        self.notify.notify_one();
        replaced
    }

    /// Waits for a value and takes it, leaving the slot empty.
    ///
    /// Returns `None` once the mailbox is closed and nothing is pending.
    pub async fn next(&self) -> Option<T> {
        loop {
            {
                let mut slot = self.lock();
                if let Some(value) = slot.pending.take() {
                    return Some(value);
                }
                if slot.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    #[cfg(test)]
    fn try_take(&self) -> Option<T> {
        self.lock().pending.take()
    }

    /// Marks the producer as gone. A pending value is still delivered.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of values overwritten before being read.
    pub fn skipped(&self) -> u64 {
        self.lock().skipped
    }
}
