#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use fitlife::error::AppError;
use fitlife::models::{Form, Meal, MealForm};
use fitlife::repository::{MealRepository, OnError, OnUpdate, Repository};
use fitlife::session::Session;
use fitlife::store::{Document, DocumentStore, Fields, ListenerRegistration, SqliteStore, WriteBatch, WriteOp};

pub const OWNER: &str = "u1";

pub async fn memory_store() -> Arc<SqliteStore> {
    Arc::new(
        SqliteStore::in_memory()
            .await
            .expect("Failed to create test store"),
    )
}

/// Waits for the first state matching `pred`.
pub async fn wait_for<S: Clone>(rx: &mut watch::Receiver<S>, pred: impl FnMut(&S) -> bool) -> S {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed")
        .clone()
}

fn injected() -> AppError {
    AppError::Store(sqlx::Error::Protocol("injected failure".to_string()))
}

/// Store that can be told to fail writes, either up front or half-way
/// through a batch, and to fail single-document reads. Listing always
/// passes through, so live queries keep working.
pub struct FlakyStore {
    inner: Arc<SqliteStore>,
    fail_writes: AtomicBool,
    fail_mid_batch: AtomicBool,
    fail_gets: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_mid_batch: AtomicBool::new(false),
            fail_gets: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mid_batch(&self, fail: bool) {
        self.fail_mid_batch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(injected())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        self.inner.list(collection).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.get(collection, id).await
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, AppError> {
        self.check()?;
        self.inner.add(collection, fields).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), AppError> {
        self.check()?;
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.check()?;
        self.inner.delete(collection, id).await
    }

    /// With `fail_mid_batch`, an update of a missing document is slipped in
    /// after the first op, so the real transaction fails part-way.
    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError> {
        self.check()?;
        if !self.fail_mid_batch.load(Ordering::SeqCst) {
            return self.inner.commit(batch).await;
        }

        let mut poisoned = WriteBatch::new();
        for (i, op) in batch.ops().iter().enumerate() {
            match op.clone() {
                WriteOp::Set { collection, id, fields } => poisoned.set(collection, id, fields),
                WriteOp::Update { collection, id, fields } => {
                    poisoned.update(collection, id, fields)
                }
                WriteOp::Delete { collection, id } => poisoned.delete(collection, id),
            };
            if i == 0 {
                poisoned.update("injected", "missing", Fields::new());
            }
        }
        self.inner.commit(poisoned).await
    }

    fn changes(&self) -> broadcast::Receiver<String> {
        self.inner.changes()
    }
}

/// Meal repository that counts what flows through it.
pub struct CountingRepository {
    inner: MealRepository,
    pub subscribes: Arc<AtomicUsize>,
    pub deliveries: Arc<AtomicUsize>,
    pub adds: Arc<AtomicUsize>,
}

impl CountingRepository {
    pub fn new(store: Arc<dyn DocumentStore>, session: Session) -> Self {
        Self {
            inner: MealRepository::new(store, session),
            subscribes: Arc::new(AtomicUsize::new(0)),
            deliveries: Arc::new(AtomicUsize::new(0)),
            adds: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Repository for CountingRepository {
    type Item = Meal;
    type Form = MealForm;

    fn subscribe(&self, on_update: OnUpdate<Meal>, on_error: OnError) -> Option<ListenerRegistration> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let deliveries = self.deliveries.clone();
        let counted: OnUpdate<Meal> = Arc::new(move |items| {
            deliveries.fetch_add(1, Ordering::SeqCst);
            on_update(items);
        });
        self.inner.subscribe(counted, on_error)
    }

    async fn add(&self, record: <MealForm as Form>::Record) -> Result<String, AppError> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        self.inner.add(record).await
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.inner.delete(id).await
    }
}
