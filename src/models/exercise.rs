use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Completable, Entity, Form, IntoFields, TrackedItem, int_or_zero, required};
use crate::error::AppError;
use crate::store::{Document, Fields};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub muscle_group: String,
    pub sets: i64,
    pub reps: i64,
    pub notes: String,
    pub image: String,
    pub is_completed: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TrackedItem for Exercise {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Completable for Exercise {
    fn is_done(&self) -> bool {
        self.is_completed
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn mark_done(&mut self, done: bool, at: DateTime<Utc>) {
        self.is_completed = done;
        self.completed_at = done.then_some(at);
    }
}

impl Entity for Exercise {
    const COLLECTION: &'static str = "exercises";
    const DONE_FIELD: Option<&'static str> = Some("isCompleted");

    type Form = ExerciseForm;

    fn decode(doc: &Document) -> Self {
        let r = doc.reader();
        Exercise {
            id: doc.id.clone(),
            name: r.string("name"),
            muscle_group: r.string("muscleGroup"),
            sets: r.int("sets"),
            reps: r.int("reps"),
            notes: r.string("notes"),
            image: r.string("image"),
            is_completed: r.bool("isCompleted"),
            created_at: r.timestamp("createdAt"),
            completed_at: r.timestamp("completedAt"),
        }
    }
}

/// Exercise as typed into the add form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExerciseForm {
    pub name: String,
    #[serde(default)]
    pub muscle_group: String,
    #[serde(default)]
    pub sets: String,
    #[serde(default)]
    pub reps: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExercise {
    pub name: String,
    pub muscle_group: String,
    pub sets: i64,
    pub reps: i64,
    pub notes: String,
}

impl Form for ExerciseForm {
    type Record = NewExercise;

    const SAVED_MESSAGE: &'static str = "Exercise saved";

    fn validate(self) -> Result<NewExercise, AppError> {
        Ok(NewExercise {
            name: required(&self.name, "Exercise name required")?,
            muscle_group: self.muscle_group.trim().to_string(),
            sets: int_or_zero(&self.sets),
            reps: int_or_zero(&self.reps),
            notes: self.notes.trim().to_string(),
        })
    }
}

impl IntoFields for NewExercise {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(self.name));
        fields.insert("muscleGroup".into(), json!(self.muscle_group));
        fields.insert("sets".into(), json!(self.sets));
        fields.insert("reps".into(), json!(self.reps));
        fields.insert("notes".into(), json!(self.notes));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_requires_name_and_defaults_numbers() {
        let err = ExerciseForm {
            name: "  ".into(),
            ..Default::default()
        }
        .validate()
        .expect_err("blank name must be rejected");
        assert_eq!(err.to_string(), "Exercise name required");

        let ok = ExerciseForm {
            name: " Squat ".into(),
            muscle_group: " Legs".into(),
            sets: "4".into(),
            reps: "ten".into(),
            notes: String::new(),
        }
        .validate()
        .expect("valid form");
        assert_eq!(ok.name, "Squat");
        assert_eq!(ok.muscle_group, "Legs");
        assert_eq!(ok.sets, 4);
        assert_eq!(ok.reps, 0);
    }

    #[test]
    fn test_mark_done_tracks_completed_at() {
        let mut exercise = Exercise::decode(&Document {
            id: "e1".into(),
            collection: "users/u/exercises".into(),
            data: Fields::new(),
        });
        let now = Utc::now();

        exercise.mark_done(true, now);
        assert!(exercise.is_done());
        assert_eq!(exercise.completed_at(), Some(now));

        exercise.mark_done(false, now);
        assert!(!exercise.is_done());
        assert_eq!(exercise.completed_at(), None);
    }
}
