use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::{
    CompletionRepository, OnError, OnUpdate, Repository, completion_fields, owner_path,
    reject_signed_out, with_system_fields,
};
use crate::error::AppError;
use crate::models::{
    Completable, Entity, Exercise, Form, IntoFields, Meal, ProgressEntry, sort_newest_first,
};
use crate::session::Session;
use crate::store::{DocumentStore, ListenerRegistration, listen};

pub type ExerciseRepository = CollectionRepository<Exercise>;
pub type MealRepository = CollectionRepository<Meal>;
pub type ProgressRepository = CollectionRepository<ProgressEntry>;

/// Repository for a flat owner-scoped collection of one record type,
/// listed newest first.
pub struct CollectionRepository<E> {
    store: Arc<dyn DocumentStore>,
    session: Session,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for CollectionRepository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            session: self.session.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> CollectionRepository<E> {
    pub fn new(store: Arc<dyn DocumentStore>, session: Session) -> Self {
        Self {
            store,
            session,
            _entity: PhantomData,
        }
    }

    fn collection(&self) -> Result<String, AppError> {
        owner_path(&self.session, E::COLLECTION)
    }

    /// One-shot read of the whole collection.
    pub async fn fetch_all(&self) -> Result<Vec<E>, AppError> {
        let path = self.collection()?;
        fetch_sorted(self.store.as_ref(), &path).await
    }
}

async fn fetch_sorted<E: Entity>(store: &dyn DocumentStore, path: &str) -> Result<Vec<E>, AppError> {
    let docs = store.list(path).await?;
    let mut items: Vec<E> = docs.iter().map(E::decode).collect();
    sort_newest_first(&mut items);
    Ok(items)
}

#[async_trait]
impl<E: Entity> Repository for CollectionRepository<E> {
    type Item = E;
    type Form = E::Form;

    fn subscribe(&self, on_update: OnUpdate<E>, on_error: OnError) -> Option<ListenerRegistration> {
        let path = match self.collection() {
            Ok(path) => path,
            Err(_) => {
                reject_signed_out(&on_update, &on_error);
                return None;
            }
        };

        let store = self.store.clone();
        let fetch_path = path.clone();
        Some(listen(
            self.store.changes(),
            path,
            move || {
                let store = store.clone();
                let path = fetch_path.clone();
                async move { fetch_sorted::<E>(store.as_ref(), &path).await }
            },
            move |items| on_update(items),
            move |msg| on_error(msg),
        ))
    }

    async fn add(&self, record: <E::Form as Form>::Record) -> Result<String, AppError> {
        let path = self.collection()?;
        let fields = with_system_fields(record.into_fields(), E::DONE_FIELD, Utc::now());
        let id = self.store.add(&path, fields).await?;
        info!("added {} to {}", id, path);
        Ok(id)
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let path = self.collection()?;
        self.store.delete(&path, id).await?;
        info!("deleted {} from {}", id, path);
        Ok(())
    }
}

#[async_trait]
impl<E: Entity + Completable> CompletionRepository for CollectionRepository<E> {
    async fn set_completed(&self, id: &str, done: bool) -> Result<(), AppError> {
        let path = self.collection()?;
        let Some(done_field) = E::DONE_FIELD else {
            warn!("{} records have no done flag", E::COLLECTION);
            return Err(AppError::validation("This record cannot be completed"));
        };
        self.store
            .update(&path, id, completion_fields(done_field, done, Utc::now()))
            .await
    }
}
