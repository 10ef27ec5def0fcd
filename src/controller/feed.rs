use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::state::{BoundCell, StateCell};
use crate::store::ListenerRegistration;

/// A state cell plus at most one live subscription feeding it. Stopping
/// retires the cell, so anything bound before the stop is dropped. Dropping
/// the feed stops it.
pub struct LiveFeed<S> {
    cell: StateCell<S>,
    registration: Mutex<Option<ListenerRegistration>>,
}

impl<S: Clone + Send + Sync + 'static> LiveFeed<S> {
    pub fn new(initial: S) -> Self {
        Self {
            cell: StateCell::new(initial),
            registration: Mutex::new(None),
        }
    }
}

impl<S> LiveFeed<S> {
    pub fn cell(&self) -> &StateCell<S> {
        &self.cell
    }

    pub fn is_listening(&self) -> bool {
        self.registration().is_some()
    }

    fn registration(&self) -> MutexGuard<'_, Option<ListenerRegistration>> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// No-op while subscribed. Otherwise runs `reset` on the state, then
    /// lets `open` subscribe with a binding to the current epoch. The lock is
    /// held throughout, so concurrent starts subscribe once.
    pub fn start(
        &self,
        reset: impl FnOnce(&StateCell<S>),
        open: impl FnOnce(BoundCell<S>) -> Option<ListenerRegistration>,
    ) {
        let mut registration = self.registration();
        if registration.is_some() {
            return;
        }
        reset(&self.cell);
        *registration = open(self.cell.bind());
    }

    /// Safe to call when not listening.
    pub fn stop(&self) {
        let registration = self.registration().take();
        self.cell.retire();
        if let Some(registration) = registration {
            info!("stopped listening on {}", registration.watched());
        }
    }
}

impl<S> Drop for LiveFeed<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
