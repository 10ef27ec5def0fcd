use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::models::TrackedItem;

/// What a list screen renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub message: Option<String>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            message: None,
        }
    }
}

/// Everything that can change a [`ListState`]. Remote deliveries and local
/// intents both go through [`ListEvent::apply`].
#[derive(Debug, Clone)]
pub enum ListEvent<T> {
    Listening,
    Snapshot(Vec<T>),
    Failed(String),
    Message(String),
    ClearMessage,
    /// Replaces the item with the same id, if it is still listed.
    Replace(T),
    /// Puts back a pre-edit copy and reports why.
    RolledBack { item: T, message: String },
}

impl<T: TrackedItem> ListEvent<T> {
    pub fn apply(self, state: &mut ListState<T>) {
        match self {
            ListEvent::Listening => {
                state.loading = true;
                state.message = None;
            }
            ListEvent::Snapshot(items) => {
                state.items = items;
                state.loading = false;
            }
            // Keep the last good list on screen.
            ListEvent::Failed(message) => {
                state.loading = false;
                state.message = Some(message);
            }
            ListEvent::Message(message) => state.message = Some(message),
            ListEvent::ClearMessage => state.message = None,
            ListEvent::Replace(item) => replace_by_id(&mut state.items, item),
            ListEvent::RolledBack { item, message } => {
                replace_by_id(&mut state.items, item);
                state.message = Some(message);
            }
        }
    }
}

fn replace_by_id<T: TrackedItem>(items: &mut [T], item: T) {
    if let Some(slot) = items.iter_mut().find(|current| current.id() == item.id()) {
        *slot = item;
    }
}

/// Observable state plus a teardown epoch. Updates made through a
/// [`BoundCell`] from an earlier epoch are dropped.
pub struct StateCell<S> {
    tx: Arc<watch::Sender<S>>,
    epoch: Arc<AtomicU64>,
}

impl<S> Clone for StateCell<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            epoch: self.epoch.clone(),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> StateCell<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            tx: Arc::new(tx),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> S {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }

    pub fn update(&self, f: impl FnOnce(&mut S)) {
        self.tx.send_modify(f);
    }

    /// Read-and-edit in one step under the state lock. Receivers are only
    /// notified when `f` returns `Some`.
    pub fn modify<T>(&self, f: impl FnOnce(&mut S) -> Option<T>) -> Option<T> {
        let mut out = None;
        self.tx.send_if_modified(|state| {
            out = f(state);
            out.is_some()
        });
        out
    }
}

impl<S> StateCell<S> {
    /// Ties later updates to the current epoch.
    pub fn bind(&self) -> BoundCell<S> {
        BoundCell {
            cell: self.clone(),
            epoch: self.epoch.load(Ordering::SeqCst),
        }
    }

    /// Starts a new epoch. Runs under the state lock, so a bound update is
    /// either fully applied before this returns or not applied at all.
    pub fn retire(&self) {
        self.tx.send_if_modified(|_| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            false
        });
    }
}

#[derive(Clone)]
pub struct BoundCell<S> {
    cell: StateCell<S>,
    epoch: u64,
}

impl<S> BoundCell<S> {
    pub fn is_current(&self) -> bool {
        self.cell.epoch.load(Ordering::SeqCst) == self.epoch
    }

    /// Returns false when the cell was retired after binding.
    pub fn update(&self, f: impl FnOnce(&mut S)) -> bool {
        let applied = self.cell.tx.send_if_modified(|state| {
            if self.cell.epoch.load(Ordering::SeqCst) != self.epoch {
                return false;
            }
            f(state);
            true
        });
        if !applied {
            debug!("dropping update from retired epoch {}", self.epoch);
        }
        applied
    }
}

impl<T: TrackedItem> BoundCell<ListState<T>> {
    pub fn dispatch(&self, event: ListEvent<T>) -> bool {
        self.update(|state| event.apply(state))
    }
}

impl<T: TrackedItem> StateCell<ListState<T>> {
    pub fn dispatch(&self, event: ListEvent<T>) {
        self.update(|state| event.apply(state));
    }
}
