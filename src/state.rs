//! Observable state containers
//!
//! Each component publishes its render-facing state through a `StateCell`.
//! Presentation code subscribes and is notified on every change, without any
//! dependency on a rendering toolkit.

use tokio::sync::watch;

/// A value with subscribe/notify semantics, backed by `tokio::sync::watch`.
///
/// Updates run under the channel's internal lock, so a read-check-write inside
/// [`StateCell::update`] is atomic with respect to other updates.
#[derive(Debug)]
pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Snapshot of the current value
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every subsequent change
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Replace the value and notify subscribers
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutate in place and notify subscribers, returning the closure's result
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut result = None;
        self.tx.send_modify(|value| result = Some(f(value)));
        match result {
            Some(r) => r,
            None => unreachable!("send_modify always runs its closure"),
        }
    }

    /// Mutate in place; subscribers are only notified when `f` returns `true`
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }
}

impl<T: Clone + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
