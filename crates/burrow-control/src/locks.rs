//! Per-tunnel mutual exclusion.
//!
//! Mutating operations on one tunnel issue several engine calls in sequence.
//! Two such sequences on the same tunnel must not interleave, while
//! operations on different tunnels must not wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use burrow_core::TunnelId;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// A lock table keyed by tunnel id.
///
/// Entries are created on first use and dropped once no holder or waiter
/// remains.
#[derive(Debug, Default)]
pub struct TunnelLocks {
    table: Mutex<HashMap<TunnelId, Slot>>,
}

impl TunnelLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    ///
    /// Dropping the returned future while it waits leaves the table as if
    /// it had never been called.
    pub async fn lock(&self, id: TunnelId) -> TunnelLockGuard<'_> {
        let mut waiting = Waiting {
            locks: self,
            id,
            armed: true,
        };
        let slot = Arc::clone(self.table.lock().entry(id).or_default());
        let guard = slot.lock_owned().await;
        waiting.armed = false;

        TunnelLockGuard {
            locks: self,
            id,
            guard: Some(guard),
        }
    }

    /// Drop the entry for `id` if the table holds the only reference.
    fn release_if_idle(table: &mut HashMap<TunnelId, Slot>, id: TunnelId) {
        if table
            .get(&id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            table.remove(&id);
        }
    }

    /// Number of ids currently held or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// True when no id is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one tunnel, released on drop.
#[derive(Debug)]
pub struct TunnelLockGuard<'a> {
    locks: &'a TunnelLocks,
    id: TunnelId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl TunnelLockGuard<'_> {
    /// The locked tunnel.
    #[must_use]
    pub const fn id(&self) -> TunnelId {
        self.id
    }
}

impl Drop for TunnelLockGuard<'_> {
    fn drop(&mut self) {
        let mut table = self.locks.table.lock();
        // Release while holding the table so no new waiter can slip in
        // between the unlock and the count check.
        drop(self.guard.take());
        TunnelLocks::release_if_idle(&mut table, self.id);
    }
}

/// Cleans up after a `lock()` future dropped before it acquired.
///
/// Declared before the pending acquisition, so the acquisition's slot
/// reference is already gone when this runs.
struct Waiting<'a> {
    locks: &'a TunnelLocks,
    id: TunnelId,
    armed: bool,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        if self.armed {
            TunnelLocks::release_if_idle(&mut self.locks.table.lock(), self.id);
        }
    }
}
