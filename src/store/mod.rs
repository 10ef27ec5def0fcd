pub mod fields;
pub mod live;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;

pub use fields::FieldReader;
pub use live::{ListenerRegistration, listen};
pub use sqlite::SqliteStore;

/// The body of one stored document.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub collection: String,
    pub data: Fields,
}

impl Document {
    pub fn reader(&self) -> FieldReader<'_> {
        FieldReader::new(&self.data)
    }
}

/// `users/{owner}/{collection}`
pub fn owner_collection(owner: &str, collection: &str) -> String {
    format!("users/{}/{}", owner, collection)
}

/// `users/{owner}/{collection}/{parent}/{sub}`
pub fn owner_sub_collection(owner: &str, collection: &str, parent: &str, sub: &str) -> String {
    format!("users/{}/{}/{}/{}", owner, collection, parent, sub)
}

/// True when `changed` is `watched` itself or one of its sub-collections.
pub fn path_is_within(changed: &str, watched: &str) -> bool {
    changed == watched
        || changed
            .strip_prefix(watched)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set { collection: String, id: String, fields: Fields },
    Update { collection: String, id: String, fields: Fields },
    Delete { collection: String, id: String },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }
}

/// Writes that commit together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: impl Into<String>, id: impl Into<String>, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.into(),
            id: id.into(),
            fields,
        });
        self
    }

    pub fn update(&mut self, collection: impl Into<String>, id: impl Into<String>, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.into(),
            id: id.into(),
            fields,
        });
        self
    }

    pub fn delete(&mut self, collection: impl Into<String>, id: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.into(),
            id: id.into(),
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Distinct collections touched, in first-touched order.
    pub fn collections(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for op in &self.ops {
            if !out.iter().any(|c| c == op.collection()) {
                out.push(op.collection().to_string());
            }
        }
        out
    }
}

/// Hosted document store with live change notification.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents in one collection, in insertion order.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, AppError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError>;

    /// Stores a new document under a store-assigned id and returns the id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, AppError>;

    /// Shallow-merges `fields` into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), AppError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError>;

    /// Collection paths, published once per successful write.
    fn changes(&self) -> broadcast::Receiver<String>;

    /// A fresh document id, for batches that create documents.
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_owner_scoped() {
        assert_eq!(owner_collection("u1", "meals"), "users/u1/meals");
        assert_eq!(
            owner_sub_collection("u1", "workouts", "w1", "items"),
            "users/u1/workouts/w1/items"
        );
    }

    #[test]
    fn test_path_is_within() {
        assert!(path_is_within("users/u1/workouts", "users/u1/workouts"));
        assert!(path_is_within("users/u1/workouts/w1/items", "users/u1/workouts"));
        assert!(!path_is_within("users/u1/workoutsx", "users/u1/workouts"));
        assert!(!path_is_within("users/u2/workouts", "users/u1/workouts"));
    }

    #[test]
    fn test_batch_collections_are_distinct() {
        let mut batch = WriteBatch::new();
        batch
            .delete("a/items", "1")
            .delete("a/items", "2")
            .delete("a", "p");
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.collections(), vec!["a/items".to_string(), "a".to_string()]);
    }
}
