pub mod collection;
pub mod profile;
pub mod workout;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::{Form, TrackedItem};
use crate::session::Session;
use crate::store::fields::{opt_timestamp_value, timestamp_value};
use crate::store::{Fields, ListenerRegistration, owner_collection};

pub use collection::{CollectionRepository, ExerciseRepository, MealRepository, ProgressRepository};
pub use profile::ProfileRepository;
pub use workout::WorkoutRepository;

pub type OnUpdate<T> = Arc<dyn Fn(Vec<T>) + Send + Sync>;
pub type OnError = Arc<dyn Fn(String) + Send + Sync>;

/// The only path from a feature to the document store. Every call resolves
/// the signed-in owner afresh, so one instance can be shared freely.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    type Item: TrackedItem;
    type Form: Form;

    /// Starts a live query over the owner's collection. `on_update` receives
    /// the full decoded list first and after every change.
    ///
    /// Signed out: calls `on_update(vec![])`, then `on_error`, and returns
    /// `None`; nothing further will be delivered.
    fn subscribe(
        &self,
        on_update: OnUpdate<Self::Item>,
        on_error: OnError,
    ) -> Option<ListenerRegistration>;

    /// Stores a new record and returns its id.
    async fn add(&self, record: <Self::Form as Form>::Record) -> Result<String, AppError>;

    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

/// Repositories whose records carry a done flag.
#[async_trait]
pub trait CompletionRepository: Repository {
    /// Writes the flag and `completedAt` together.
    async fn set_completed(&self, id: &str, done: bool) -> Result<(), AppError>;
}

pub(crate) fn resolve_owner(session: &Session) -> Result<String, AppError> {
    session.current_owner().ok_or(AppError::NotLoggedIn)
}

pub(crate) fn owner_path(session: &Session, collection: &str) -> Result<String, AppError> {
    resolve_owner(session).map(|owner| owner_collection(&owner, collection))
}

/// Signed-out subscribe contract shared by every repository.
pub(crate) fn reject_signed_out<T>(on_update: &OnUpdate<T>, on_error: &OnError) {
    on_update(Vec::new());
    on_error(AppError::NotLoggedIn.to_string());
}

/// Caller fields with `createdAt` and the completion defaults laid over them.
pub(crate) fn with_system_fields(
    mut fields: Fields,
    done_field: Option<&str>,
    now: DateTime<Utc>,
) -> Fields {
    fields.insert("createdAt".into(), timestamp_value(now));
    if let Some(done_field) = done_field {
        fields.insert(done_field.into(), Value::Bool(false));
        fields.insert("completedAt".into(), Value::Null);
    }
    fields
}

/// `{done_field: done, completedAt: now or null}` as one update.
pub(crate) fn completion_fields(done_field: &str, done: bool, now: DateTime<Utc>) -> Fields {
    let mut fields = Fields::new();
    fields.insert(done_field.into(), json!(done));
    fields.insert(
        "completedAt".into(),
        opt_timestamp_value(done.then_some(now)),
    );
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_fields_win_over_caller_fields() {
        let mut caller = Fields::new();
        caller.insert("title".into(), json!("Oats"));
        caller.insert("isCompleted".into(), json!(true));
        caller.insert("createdAt".into(), json!("1999-01-01T00:00:00+00:00"));

        let now = Utc::now();
        let fields = with_system_fields(caller, Some("isCompleted"), now);
        assert_eq!(fields["title"], json!("Oats"));
        assert_eq!(fields["isCompleted"], json!(false));
        assert_eq!(fields["completedAt"], Value::Null);
        assert_eq!(fields["createdAt"], json!(now.to_rfc3339()));
    }

    #[test]
    fn test_no_completion_defaults_without_done_field() {
        let fields = with_system_fields(Fields::new(), None, Utc::now());
        assert!(fields.contains_key("createdAt"));
        assert!(!fields.contains_key("completedAt"));
    }

    #[test]
    fn test_completion_fields() {
        let now = Utc::now();
        let done = completion_fields("isDone", true, now);
        assert_eq!(done["isDone"], json!(true));
        assert_eq!(done["completedAt"], json!(now.to_rfc3339()));

        let undone = completion_fields("isDone", false, now);
        assert_eq!(undone["completedAt"], Value::Null);
    }

    #[test]
    fn test_signed_out_owner_path() {
        let session = Session::signed_out();
        assert!(matches!(
            owner_path(&session, "meals"),
            Err(AppError::NotLoggedIn)
        ));
        session.sign_in("u1");
        assert_eq!(owner_path(&session, "meals").expect("path"), "users/u1/meals");
    }
}
