//! Per-session turn serialization.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as TurnMutex, OwnedMutexGuard};

/// Keyed async locks, one per session id.
///
/// Turns for the same session run one at a time, in the order they asked for
/// the lock; turns for different sessions never wait on each other. An entry
/// is dropped as soon as no turn holds or awaits it, including a turn that
/// gave up while still waiting.
#[derive(Debug, Default)]
pub struct SessionLocks {
    inner: Mutex<HashMap<String, Slot>>,
}

#[derive(Debug, Default)]
struct Slot {
    lock: Arc<TurnMutex<()>>,
    /// Turns holding or waiting for `lock`.
    users: usize,
}

impl SessionLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session_id`.
    pub async fn acquire(&self, session_id: &str) -> SessionTurn<'_> {
        let (lock, registration) = self.register(session_id);
        let guard = lock.lock_owned().await;
        SessionTurn {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of sessions with a turn in progress or waiting.
    #[must_use]
    pub fn active(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn register(&self, session_id: &str) -> (Arc<TurnMutex<()>>, Registration<'_>) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = map.entry(session_id.to_string()).or_default();
        slot.users += 1;
        (
            Arc::clone(&slot.lock),
            Registration {
                locks: self,
                session_id: session_id.to_string(),
            },
        )
    }
}

/// Exclusive hold on one session; released on drop.
#[derive(Debug)]
pub struct SessionTurn<'a> {
    // Field order matters: the guard is released before the entry is
    // unregistered.
    _guard: OwnedMutexGuard<()>,
    _registration: Registration<'a>,
}

/// Counts one turn against its session's entry for as long as it lives.
#[derive(Debug)]
struct Registration<'a> {
    locks: &'a SessionLocks,
    session_id: String,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut map = self
            .locks
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = map.get_mut(&self.session_id) {
            slot.users -= 1;
            if slot.users == 0 {
                map.remove(&self.session_id);
            }
        }
    }
}
