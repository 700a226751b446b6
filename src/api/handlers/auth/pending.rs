//! Login attempts between the redirect to the provider and the callback.

use super::utils::generate_token;
use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Upper bound on concurrent login attempts; the oldest is dropped beyond it.
const MAX_PENDING_AUTHORIZATIONS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub state: String,
    pub nonce: String,
    pub return_to: String,
    created_at: Instant,
}

/// Attempts by `state`, plus their states in issue order.
///
/// `order` may still hold states already taken; they are skipped when reached.
#[derive(Default)]
struct Inner {
    entries: HashMap<String, PendingAuthorization>,
    order: VecDeque<String>,
}

impl Inner {
    /// Drop expired attempts from the front of the queue.
    fn sweep(&mut self, ttl: Duration) {
        while let Some(state) = self.order.front() {
            let live = self
                .entries
                .get(state)
                .is_some_and(|entry| entry.created_at.elapsed() < ttl);
            if live {
                break;
            }
            self.entries.remove(state);
            self.order.pop_front();
        }
    }

    /// Drop the oldest attempt still outstanding.
    fn evict_oldest(&mut self) {
        while let Some(state) = self.order.pop_front() {
            if self.entries.remove(&state).is_some() {
                return;
            }
        }
    }
}

pub struct PendingStore {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<Inner>,
}

impl PendingStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_PENDING_AUTHORIZATIONS)
    }

    #[must_use]
    fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Record a new login attempt with fresh `state` and `nonce` values.
    ///
    /// # Errors
    /// Returns an error if the random source fails.
    pub async fn issue(&self, return_to: String) -> Result<PendingAuthorization> {
        let pending = PendingAuthorization {
            state: generate_token()?,
            nonce: generate_token()?,
            return_to,
            created_at: Instant::now(),
        };

        let mut inner = self.inner.lock().await;
        inner.sweep(self.ttl);
        if inner.entries.len() >= self.capacity {
            inner.evict_oldest();
        }
        // taken states linger in the queue until reached; keep it bounded
        if inner.order.len() >= self.capacity.saturating_mul(2) {
            let Inner { entries, order } = &mut *inner;
            order.retain(|state| entries.contains_key(state));
        }
        inner.order.push_back(pending.state.clone());
        inner
            .entries
            .insert(pending.state.clone(), pending.clone());

        Ok(pending)
    }

    /// Consume a login attempt. A `state` is accepted at most once.
    pub async fn take(&self, state: &str) -> Option<PendingAuthorization> {
        let mut inner = self.inner.lock().await;
        inner
            .entries
            .remove(state)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }
}
