use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{Document, DocumentStore, Fields, WriteBatch, WriteOp};
use crate::error::AppError;

const CHANGE_BUFFER: usize = 256;

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    collection: String,
    data: String,
}

impl DocumentRow {
    fn into_document(self) -> Document {
        let data = match serde_json::from_str::<Value>(&self.data) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(
                    "document {}/{} has a non-object body, reading it as empty",
                    self.collection, self.id
                );
                Fields::new()
            }
        };
        Document {
            id: self.id,
            collection: self.collection,
            data,
        }
    }
}

/// Document store on a single SQLite table. Batches run inside one
/// transaction; change notifications go out only after commit.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    changes: broadcast::Sender<String>,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every pooled connection to `:memory:` is its own database, so pin one.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self::from_pool(pool))
    }

    pub async fn in_memory() -> Result<Self, AppError> {
        Self::connect("sqlite::memory:").await
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self { pool, changes }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of live listeners currently attached.
    pub fn listener_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn publish(&self, collections: Vec<String>) {
        for collection in collections {
            debug!("collection changed: {}", collection);
            // No receivers is fine.
            let _ = self.changes.send(collection);
        }
    }
}

async fn apply(conn: &mut SqliteConnection, op: &WriteOp) -> Result<(), AppError> {
    match op {
        WriteOp::Set { collection, id, fields } => {
            let data = serde_json::to_string(fields)?;
            sqlx::query(
                "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?) \
                 ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data",
            )
            .bind(collection)
            .bind(id)
            .bind(data)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::Update { collection, id, fields } => {
            let current: Option<(String,)> =
                sqlx::query_as("SELECT data FROM documents WHERE collection = ? AND id = ?")
                    .bind(collection)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?;

            let Some((raw,)) = current else {
                return Err(AppError::NotFound(format!("{}/{}", collection, id)));
            };

            let mut merged = match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                _ => Fields::new(),
            };
            for (key, value) in fields {
                merged.insert(key.clone(), value.clone());
            }

            sqlx::query("UPDATE documents SET data = ? WHERE collection = ? AND id = ?")
                .bind(serde_json::to_string(&merged)?)
                .bind(collection)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        WriteOp::Delete { collection, id } => {
            sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, collection, data FROM documents WHERE collection = ? ORDER BY seq ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DocumentRow::into_document).collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, collection, data FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DocumentRow::into_document))
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, AppError> {
        let id = self.new_id();
        let mut batch = WriteBatch::new();
        batch.set(collection, id.clone(), fields);
        self.commit(batch).await?;
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), AppError> {
        let mut batch = WriteBatch::new();
        batch.update(collection, id, fields);
        self.commit(batch).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        let mut batch = WriteBatch::new();
        batch.delete(collection, id);
        self.commit(batch).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for op in batch.ops() {
            // Dropping `tx` on error rolls back everything applied so far.
            apply(&mut *tx, op).await?;
        }
        tx.commit().await?;

        self.publish(batch.collections());
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}
