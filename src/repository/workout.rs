use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};

use super::{
    CompletionRepository, OnError, OnUpdate, Repository, completion_fields, reject_signed_out,
    resolve_owner, with_system_fields,
};
use crate::error::AppError;
use crate::models::workout::{DEFAULT_ITEM_TITLE, ITEM_DONE_FIELD, ITEMS};
use crate::models::{
    Completable, Entity, Exercise, IntoFields, NewWorkout, Workout, WorkoutForm, WorkoutItem,
    sort_newest_first,
};
use crate::session::Session;
use crate::store::{
    DocumentStore, Fields, ListenerRegistration, WriteBatch, listen, owner_collection,
    owner_sub_collection,
};

const DEFAULT_SETS: i64 = 3;
const DEFAULT_REPS: i64 = 10;
const WORKOUT_DONE_FIELD: &str = "isCompleted";

pub const EMPTY_WORKOUT_MESSAGE: &str = "Add an exercise before completing this workout";

/// Workouts and their item checklists. A workout's `isCompleted` is derived
/// from its items: every item write re-derives it from the sibling items and
/// commits the item and the flag together.
#[derive(Clone)]
pub struct WorkoutRepository {
    store: Arc<dyn DocumentStore>,
    session: Session,
}

fn workouts_path(owner: &str) -> String {
    owner_collection(owner, Workout::COLLECTION)
}

fn items_path(owner: &str, workout_id: &str) -> String {
    owner_sub_collection(owner, Workout::COLLECTION, workout_id, ITEMS)
}

async fn fetch_items(
    store: &dyn DocumentStore,
    owner: &str,
    workout_id: &str,
) -> Result<Vec<WorkoutItem>, AppError> {
    let docs = store.list(&items_path(owner, workout_id)).await?;
    let mut items: Vec<WorkoutItem> = docs.iter().map(WorkoutItem::decode).collect();
    items.sort_by_key(|item| item.order);
    Ok(items)
}

async fn fetch_workouts(store: &dyn DocumentStore, owner: &str) -> Result<Vec<Workout>, AppError> {
    let docs = store.list(&workouts_path(owner)).await?;
    let mut workouts: Vec<Workout> = docs.iter().map(Workout::decode).collect();
    sort_newest_first(&mut workouts);
    for workout in &mut workouts {
        workout.items = fetch_items(store, owner, &workout.id).await?;
    }
    Ok(workouts)
}

impl WorkoutRepository {
    pub fn new(store: Arc<dyn DocumentStore>, session: Session) -> Self {
        Self { store, session }
    }

    /// One-shot read of every workout with its items.
    pub async fn fetch_all(&self) -> Result<Vec<Workout>, AppError> {
        let owner = resolve_owner(&self.session)?;
        fetch_workouts(self.store.as_ref(), &owner).await
    }

    /// Marks one item and re-derives the parent's completion with the new
    /// value in place. Both land in one batch. Returns the derived value.
    pub async fn set_item_done(
        &self,
        workout_id: &str,
        item_id: &str,
        done: bool,
    ) -> Result<bool, AppError> {
        let owner = resolve_owner(&self.session)?;
        let now = Utc::now();
        let path = items_path(&owner, workout_id);
        let mut items = fetch_items(self.store.as_ref(), &owner, workout_id).await?;
        items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", path, item_id)))?
            .mark_done(done, now);

        let mut batch = WriteBatch::new();
        batch.update(
            path.as_str(),
            item_id,
            completion_fields(ITEM_DONE_FIELD, done, now),
        );
        let complete = Workout::items_complete(&items);
        self.stage_completion(&owner, workout_id, complete, now, &mut batch)
            .await?;
        self.store.commit(batch).await?;
        Ok(complete)
    }

    /// Removes one item and re-derives the parent's completion from the
    /// items that remain, in one batch.
    pub async fn delete_item(&self, workout_id: &str, item_id: &str) -> Result<(), AppError> {
        let owner = resolve_owner(&self.session)?;
        let now = Utc::now();
        let mut items = fetch_items(self.store.as_ref(), &owner, workout_id).await?;
        items.retain(|item| item.id != item_id);

        let mut batch = WriteBatch::new();
        batch.delete(items_path(&owner, workout_id), item_id);
        let complete = Workout::items_complete(&items);
        self.stage_completion(&owner, workout_id, complete, now, &mut batch)
            .await?;
        self.store.commit(batch).await?;
        info!("deleted item {} of workout {}", item_id, workout_id);
        Ok(())
    }

    /// Clears every item and the workout's own flag in one batch.
    pub async fn reset_items(&self, workout_id: &str) -> Result<(), AppError> {
        let owner = resolve_owner(&self.session)?;
        let now = Utc::now();
        let items = fetch_items(self.store.as_ref(), &owner, workout_id).await?;
        let path = items_path(&owner, workout_id);

        let mut batch = WriteBatch::new();
        for item in &items {
            batch.update(
                path.as_str(),
                item.id.as_str(),
                completion_fields(ITEM_DONE_FIELD, false, now),
            );
        }
        batch.update(
            workouts_path(&owner),
            workout_id,
            completion_fields(WORKOUT_DONE_FIELD, false, now),
        );
        self.store.commit(batch).await?;
        info!("reset {} items of workout {}", items.len(), workout_id);
        Ok(())
    }

    /// Copies exercises into the workout's checklist, skipping any already
    /// present. Returns how many were added.
    pub async fn add_exercises(
        &self,
        workout_id: &str,
        exercise_ids: &[String],
    ) -> Result<usize, AppError> {
        let owner = resolve_owner(&self.session)?;
        if workout_id.trim().is_empty() {
            return Err(AppError::validation("Invalid workout"));
        }
        if exercise_ids.is_empty() {
            return Err(AppError::validation("No exercises selected"));
        }

        let existing = fetch_items(self.store.as_ref(), &owner, workout_id).await?;
        let mut present: HashSet<String> = existing
            .iter()
            .map(|item| item.exercise_id.clone())
            .filter(|id| !id.is_empty())
            .collect();
        let mut next_order = existing
            .iter()
            .map(|item| item.order)
            .max()
            .map_or(0, |max| max + 1);

        let exercises_path = owner_collection(&owner, Exercise::COLLECTION);
        let path = items_path(&owner, workout_id);
        let now = Utc::now();
        let mut batch = WriteBatch::new();

        for exercise_id in exercise_ids {
            if !present.insert(exercise_id.clone()) {
                continue;
            }
            let Some(doc) = self.store.get(&exercises_path, exercise_id).await? else {
                debug!("exercise {} not found, skipping", exercise_id);
                continue;
            };
            let exercise = Exercise::decode(&doc);
            let title = if exercise.name.is_empty() {
                doc.reader().string_or("title", DEFAULT_ITEM_TITLE)
            } else {
                exercise.name
            };

            let mut fields = Fields::new();
            fields.insert("exerciseId".into(), json!(exercise_id));
            fields.insert("title".into(), json!(title));
            fields.insert("sets".into(), json!(DEFAULT_SETS));
            fields.insert("reps".into(), json!(DEFAULT_REPS));
            fields.insert("notes".into(), json!(""));
            fields.insert("order".into(), json!(next_order));
            next_order += 1;

            batch.set(
                path.as_str(),
                self.store.new_id(),
                with_system_fields(fields, Some(ITEM_DONE_FIELD), now),
            );
        }

        let added = batch.len();
        if added > 0 {
            // New items start open.
            self.stage_completion(&owner, workout_id, false, now, &mut batch)
                .await?;
            self.store.commit(batch).await?;
        }
        info!("added {} exercise(s) to workout {}", added, workout_id);
        Ok(added)
    }

    /// Adds the workout's flag to `batch` when `complete` disagrees with
    /// what is stored. A missing workout is `NotFound` before anything is
    /// written.
    async fn stage_completion(
        &self,
        owner: &str,
        workout_id: &str,
        complete: bool,
        now: DateTime<Utc>,
        batch: &mut WriteBatch,
    ) -> Result<(), AppError> {
        let path = workouts_path(owner);
        let doc = self
            .store
            .get(&path, workout_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", path, workout_id)))?;

        if Workout::decode(&doc).is_done() != complete {
            debug!("workout {} completion -> {}", workout_id, complete);
            batch.update(
                path.as_str(),
                workout_id,
                completion_fields(WORKOUT_DONE_FIELD, complete, now),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for WorkoutRepository {
    type Item = Workout;
    type Form = WorkoutForm;

    /// Item changes fall under the workouts path, so they re-deliver too.
    fn subscribe(
        &self,
        on_update: OnUpdate<Workout>,
        on_error: OnError,
    ) -> Option<ListenerRegistration> {
        let Ok(owner) = resolve_owner(&self.session) else {
            reject_signed_out(&on_update, &on_error);
            return None;
        };

        let store = self.store.clone();
        let fetch_owner = owner.clone();
        Some(listen(
            self.store.changes(),
            workouts_path(&owner),
            move || {
                let store = store.clone();
                let owner = fetch_owner.clone();
                async move { fetch_workouts(store.as_ref(), &owner).await }
            },
            move |workouts| on_update(workouts),
            move |msg| on_error(msg),
        ))
    }

    /// The workout and its initial items land in one batch.
    async fn add(&self, mut record: NewWorkout) -> Result<String, AppError> {
        let owner = resolve_owner(&self.session)?;
        let now = Utc::now();
        let items = std::mem::take(&mut record.items);
        let workout_id = self.store.new_id();
        let path = items_path(&owner, &workout_id);

        let mut batch = WriteBatch::new();
        batch.set(
            workouts_path(&owner),
            workout_id.as_str(),
            with_system_fields(record.into_fields(), Workout::DONE_FIELD, now),
        );
        for item in items {
            batch.set(
                path.as_str(),
                self.store.new_id(),
                with_system_fields(item.into_fields(), Some(ITEM_DONE_FIELD), now),
            );
        }
        self.store.commit(batch).await?;

        info!("created workout {}", workout_id);
        Ok(workout_id)
    }

    /// Items first, then the workout, all in one batch.
    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let owner = resolve_owner(&self.session)?;
        let path = items_path(&owner, id);
        let items = self.store.list(&path).await?;

        let mut batch = WriteBatch::new();
        for item in &items {
            batch.delete(path.as_str(), item.id.as_str());
        }
        batch.delete(workouts_path(&owner), id);
        self.store.commit(batch).await?;

        info!("deleted workout {} with {} items", id, items.len());
        Ok(())
    }
}

#[async_trait]
impl CompletionRepository for WorkoutRepository {
    /// Completing a workout completes its whole checklist and reopening it
    /// reopens every item, in one batch. A workout without items cannot be
    /// completed.
    async fn set_completed(&self, id: &str, done: bool) -> Result<(), AppError> {
        let owner = resolve_owner(&self.session)?;
        let now = Utc::now();
        let items = fetch_items(self.store.as_ref(), &owner, id).await?;
        if done && items.is_empty() {
            return Err(AppError::validation(EMPTY_WORKOUT_MESSAGE));
        }

        let path = items_path(&owner, id);
        let mut batch = WriteBatch::new();
        for item in items.iter().filter(|item| item.is_done != done) {
            batch.update(
                path.as_str(),
                item.id.as_str(),
                completion_fields(ITEM_DONE_FIELD, done, now),
            );
        }
        batch.update(
            workouts_path(&owner),
            id,
            completion_fields(WORKOUT_DONE_FIELD, done, now),
        );
        self.store.commit(batch).await?;
        info!("workout {} and its {} items set to done={}", id, items.len(), done);
        Ok(())
    }
}
