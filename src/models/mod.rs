pub mod exercise;
pub mod meal;
pub mod profile;
pub mod progress;
pub mod workout;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::store::{Document, Fields};

pub use exercise::{Exercise, ExerciseForm, NewExercise};
pub use meal::{Meal, MealForm, NewMeal};
pub use profile::{BmiCategory, ProfileForm, UserProfile, bmi};
pub use progress::{NewProgressEntry, ProgressEntry, ProgressForm};
pub use workout::{NewWorkout, NewWorkoutItem, Workout, WorkoutForm, WorkoutItem, checklist_text};

/// A user-owned record shown in a list.
pub trait TrackedItem: Clone + Serialize + Send + Sync + 'static {
    /// Empty until the store has assigned one.
    fn id(&self) -> &str;

    fn created_at(&self) -> Option<DateTime<Utc>>;
}

/// A record stored as one document in an owner-scoped collection.
pub trait Entity: TrackedItem {
    /// Collection name under `users/{owner}/`.
    const COLLECTION: &'static str;

    /// Stored name of the done flag, if the record has one.
    const DONE_FIELD: Option<&'static str>;

    type Form: Form;

    /// Never fails: unreadable fields take their zero value.
    fn decode(doc: &Document) -> Self;
}

/// A record with a done flag and a `completed_at` that is set exactly
/// while the flag is true.
pub trait Completable: TrackedItem {
    fn is_done(&self) -> bool;

    fn completed_at(&self) -> Option<DateTime<Utc>>;

    fn mark_done(&mut self, done: bool, at: DateTime<Utc>);
}

/// Raw user input for creating a record. Validation happens locally before
/// anything is sent to the store.
pub trait Form: Send + 'static {
    type Record: IntoFields + Send + 'static;

    /// Confirmation shown once the record has been stored.
    const SAVED_MESSAGE: &'static str;

    fn validate(self) -> Result<Self::Record, AppError>;
}

/// Caller-supplied document fields for a new record, before the repository
/// adds `createdAt` and the completion defaults.
pub trait IntoFields {
    fn into_fields(self) -> Fields;
}

/// Newest first; records without a readable `createdAt` sink to the end.
pub fn sort_newest_first<T: TrackedItem>(items: &mut [T]) {
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

pub(crate) fn required(value: &str, message: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AppError::validation(message))
    } else {
        Ok(trimmed.to_string())
    }
}

pub(crate) fn int_or_zero(text: &str) -> i64 {
    text.trim().parse().unwrap_or(0)
}

pub(crate) fn float_or_zero(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
