//! Aggregate discovery count with predicate waits.
//!
//! The counter is the sum of effective activations minus deactivations of
//! participants, topics and endpoints. Every applied notification wakes all
//! waiters, even when the count did not move; waiters re-check their
//! predicate, so spurious wakeups are harmless.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use crate::error::{ExecutionError, GraphError, GraphResult};

fn lock_err(context: &'static str) -> GraphError {
    GraphError::internal(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct CounterState {
    value: Mutex<i64>,
    changed: Condvar,
}

impl CounterState {
    fn lock(&self) -> GraphResult<MutexGuard<'_, i64>> {
        self.value.lock().map_err(|_| lock_err("counter.value"))
    }
}

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    watchers: Mutex<Vec<Weak<CounterState>>>,
}

/// External stop signal for counter waits.
///
/// Cloning shares the signal. Cancelling wakes every wait currently using the
/// token; waits started after cancellation return immediately.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake all waits observing it.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        let watchers = match self.state.watchers.lock() {
            Ok(guard) => guard.iter().filter_map(Weak::upgrade).collect::<Vec<_>>(),
            Err(poisoned) => poisoned.into_inner().iter().filter_map(Weak::upgrade).collect(),
        };
        for counter in watchers {
            // Taking the lock orders this notify after any waiter's flag check.
            let _guard = counter.value.lock();
            counter.changed.notify_all();
        }
    }

    /// Returns true once [`CancellationToken::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    fn watch(&self, counter: &Arc<CounterState>) -> GraphResult<()> {
        let mut watchers = self
            .state
            .watchers
            .lock()
            .map_err(|_| lock_err("token.watchers"))?;
        watchers.retain(|w| w.strong_count() > 0);
        if !watchers.iter().any(|w| w.as_ptr() == Arc::as_ptr(counter)) {
            watchers.push(Arc::downgrade(counter));
        }
        Ok(())
    }
}

/// Shared discovery count.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryCounter {
    state: Arc<CounterState>,
}

impl DiscoveryCounter {
    /// Create a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    ///
    /// # Errors
    /// Internal error if the counter lock is poisoned.
    pub fn get(&self) -> GraphResult<i64> {
        Ok(*self.state.lock()?)
    }

    /// Add `delta` and wake every waiter. Returns the new value.
    ///
    /// # Errors
    /// Internal error if the counter lock is poisoned.
    pub fn add(&self, delta: i64) -> GraphResult<i64> {
        let mut value = self.state.lock()?;
        *value += delta;
        let now = *value;
        drop(value);
        self.state.changed.notify_all();
        Ok(now)
    }

    /// Block until `predicate(count)` holds, `cancel` is raised, or `timeout`
    /// elapses. Returns the count that satisfied the predicate.
    ///
    /// # Errors
    /// - `Cancelled` if the token was raised first
    /// - `Timeout` if `timeout` elapsed first
    pub fn wait_until<F>(&self, mut predicate: F, cancel: &CancellationToken, timeout: Option<Duration>) -> GraphResult<i64>
    where
        F: FnMut(i64) -> bool,
    {
        cancel.watch(&self.state)?;
        let deadline = timeout.map(|t| Instant::now() + t);

        let mut value = self.state.lock()?;
        loop {
            if cancel.is_cancelled() {
                return Err(ExecutionError::Cancelled.into());
            }
            if predicate(*value) {
                return Ok(*value);
            }

            value = match deadline {
                None => self
                    .state
                    .changed
                    .wait(value)
                    .map_err(|_| lock_err("counter.value"))?,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let duration_ms = timeout
                            .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
                        return Err(ExecutionError::Timeout { duration_ms }.into());
                    }
                    self.state
                        .changed
                        .wait_timeout(value, deadline - now)
                        .map_err(|_| lock_err("counter.value"))?
                        .0
                }
            };
        }
    }
}
