use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use super::feed::LiveFeed;
use super::state::{ListEvent, ListState, StateCell};
use crate::models::{Completable, Form, TrackedItem};
use crate::repository::{CompletionRepository, OnError, OnUpdate, Repository};

/// Mirrors one repository's live list into a [`ListState`] and forwards
/// user intents to it. Writes run in the background; their outcomes land in
/// the state. Outcomes of writes issued before `stop_listening` are dropped.
pub struct LiveListController<R: Repository> {
    pub(crate) repo: Arc<R>,
    feed: LiveFeed<ListState<R::Item>>,
}

impl<R: Repository> LiveListController<R> {
    pub fn new(repo: R) -> Self {
        Self::with_shared(Arc::new(repo))
    }

    pub fn with_shared(repo: Arc<R>) -> Self {
        Self {
            repo,
            feed: LiveFeed::new(ListState::default()),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub(crate) fn cell(&self) -> &StateCell<ListState<R::Item>> {
        self.feed.cell()
    }

    pub fn state(&self) -> ListState<R::Item> {
        self.cell().snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<ListState<R::Item>> {
        self.cell().subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.feed.is_listening()
    }

    /// No-op while already subscribed.
    pub fn start_listening(&self) {
        self.feed.start(
            |cell| cell.dispatch(ListEvent::Listening),
            |updates| {
                let errors = updates.clone();
                let on_update: OnUpdate<R::Item> = Arc::new(move |items| {
                    updates.dispatch(ListEvent::Snapshot(items));
                });
                let on_error: OnError = Arc::new(move |message| {
                    errors.dispatch(ListEvent::Failed(message));
                });
                self.repo.subscribe(on_update, on_error)
            },
        );
    }

    /// Safe to call when not listening.
    pub fn stop_listening(&self) {
        self.feed.stop();
    }

    /// Validates locally; nothing reaches the repository when the form is
    /// rejected. Returns the write task when one was started.
    pub fn add(&self, form: R::Form) -> Option<JoinHandle<()>> {
        let record = match form.validate() {
            Ok(record) => record,
            Err(e) => {
                self.cell().dispatch(ListEvent::Message(e.to_string()));
                return None;
            }
        };

        let repo = self.repo.clone();
        let bound = self.cell().bind();
        Some(tokio::spawn(async move {
            let message = match repo.add(record).await {
                Ok(_) => <R::Form as Form>::SAVED_MESSAGE.to_string(),
                Err(e) => {
                    warn!("add failed: {}", e);
                    e.to_string()
                }
            };
            bound.dispatch(ListEvent::Message(message));
        }))
    }

    /// Not optimistic: the item leaves the list with the next snapshot.
    pub fn delete(&self, id: &str) -> JoinHandle<()> {
        let repo = self.repo.clone();
        let bound = self.cell().bind();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = repo.delete(&id).await {
                warn!("delete of {} failed: {}", id, e);
                bound.dispatch(ListEvent::Message(e.to_string()));
            }
        })
    }

    pub fn clear_message(&self) {
        self.cell().dispatch(ListEvent::ClearMessage);
    }
}

impl<R> LiveListController<R>
where
    R: CompletionRepository,
    R::Item: Completable,
{
    /// Flips the listed item at once, then writes. A failed write puts back
    /// the copy taken before the flip.
    pub fn toggle_done(&self, id: &str, done: bool) -> JoinHandle<()> {
        let now = Utc::now();
        let original = self.cell().modify(|state| {
            let item = state.items.iter_mut().find(|item| item.id() == id)?;
            let original = item.clone();
            item.mark_done(done, now);
            Some(original)
        });

        let repo = self.repo.clone();
        let bound = self.cell().bind();
        let id = id.to_string();
        tokio::spawn(async move {
            let Err(e) = repo.set_completed(&id, done).await else {
                return;
            };
            warn!("completion write for {} failed: {}", id, e);
            let message = e.to_string();
            let event = match original {
                Some(item) => ListEvent::RolledBack { item, message },
                None => ListEvent::Message(message),
            };
            bound.dispatch(event);
        })
    }
}
