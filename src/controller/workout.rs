use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::list::LiveListController;
use super::state::ListEvent;
use crate::models::Completable;
use crate::repository::WorkoutRepository;

pub type WorkoutController = LiveListController<WorkoutRepository>;

impl LiveListController<WorkoutRepository> {
    /// Flips one checklist item and re-derives the workout's flag locally,
    /// then writes. A failed write restores the whole pre-flip workout.
    pub fn toggle_item_done(&self, workout_id: &str, item_id: &str, done: bool) -> JoinHandle<()> {
        let now = Utc::now();
        let original = self.cell().modify(|state| {
            let workout = state.items.iter_mut().find(|w| w.id == workout_id)?;
            let original = workout.clone();
            if let Some(item) = workout.item_mut(item_id) {
                item.mark_done(done, now);
            }
            workout.recompute_completion(now);
            Some(original)
        });

        let repo = self.repo.clone();
        let bound = self.cell().bind();
        let (workout_id, item_id) = (workout_id.to_string(), item_id.to_string());
        tokio::spawn(async move {
            let Err(e) = repo.set_item_done(&workout_id, &item_id, done).await else {
                return;
            };
            warn!("item write {}/{} failed: {}", workout_id, item_id, e);
            let message = e.to_string();
            bound.dispatch(match original {
                Some(item) => ListEvent::RolledBack { item, message },
                None => ListEvent::Message(message),
            });
        })
    }

    pub fn delete_item(&self, workout_id: &str, item_id: &str) -> JoinHandle<()> {
        let repo = self.repo.clone();
        let bound = self.cell().bind();
        let (workout_id, item_id) = (workout_id.to_string(), item_id.to_string());
        tokio::spawn(async move {
            if let Err(e) = repo.delete_item(&workout_id, &item_id).await {
                warn!("item delete {}/{} failed: {}", workout_id, item_id, e);
                bound.dispatch(ListEvent::Message(e.to_string()));
            }
        })
    }

    pub fn reset_items(&self, workout_id: &str) -> JoinHandle<()> {
        let repo = self.repo.clone();
        let bound = self.cell().bind();
        let workout_id = workout_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = repo.reset_items(&workout_id).await {
                warn!("reset of {} failed: {}", workout_id, e);
                bound.dispatch(ListEvent::Message(e.to_string()));
            }
        })
    }

    pub fn add_exercises(&self, workout_id: &str, exercise_ids: Vec<String>) -> JoinHandle<()> {
        let repo = self.repo.clone();
        let bound = self.cell().bind();
        let workout_id = workout_id.to_string();
        tokio::spawn(async move {
            let message = match repo.add_exercises(&workout_id, &exercise_ids).await {
                Ok(0) => "Exercises already in this workout".to_string(),
                Ok(added) => format!("Added {} exercise(s)", added),
                Err(e) => e.to_string(),
            };
            bound.dispatch(ListEvent::Message(message));
        })
    }
}
