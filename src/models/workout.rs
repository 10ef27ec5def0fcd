use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Completable, Entity, Form, IntoFields, TrackedItem, int_or_zero, required};
use crate::error::AppError;
use crate::store::{Document, Fields};

pub const DEFAULT_DAY: &str = "Monday";
pub const DEFAULT_ITEM_TITLE: &str = "Exercise";
pub const ITEMS: &str = "items";
pub const ITEM_DONE_FIELD: &str = "isDone";

/// One checklist entry under a workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutItem {
    pub id: String,
    /// Source exercise when the item was copied from the exercise list.
    pub exercise_id: String,
    pub title: String,
    pub order: i64,
    pub sets: i64,
    pub reps: i64,
    pub duration_sec: Option<i64>,
    pub notes: String,
    pub is_done: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkoutItem {
    pub fn decode(doc: &Document) -> Self {
        let r = doc.reader();
        WorkoutItem {
            id: doc.id.clone(),
            exercise_id: r.string("exerciseId"),
            title: r.string_or("title", DEFAULT_ITEM_TITLE),
            order: r.int("order"),
            sets: r.int("sets"),
            reps: r.int("reps"),
            duration_sec: r.opt_int("durationSec"),
            notes: r.string("notes"),
            is_done: r.bool("isDone"),
            created_at: r.timestamp("createdAt"),
            completed_at: r.timestamp("completedAt"),
        }
    }
}

impl TrackedItem for WorkoutItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Completable for WorkoutItem {
    fn is_done(&self) -> bool {
        self.is_done
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn mark_done(&mut self, done: bool, at: DateTime<Utc>) {
        self.is_done = done;
        self.completed_at = done.then_some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub name: String,
    pub day: String,
    pub duration_min: i64,
    pub instructions: String,
    pub required_equipment: Vec<String>,
    pub image_url: Option<String>,
    pub is_completed: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Ordered by `order`.
    pub items: Vec<WorkoutItem>,
}

impl Workout {
    /// A workout is complete when it has items and every one is done.
    pub fn items_complete(items: &[WorkoutItem]) -> bool {
        !items.is_empty() && items.iter().all(|item| item.is_done)
    }

    /// Re-derives `is_completed` from the current items.
    pub fn recompute_completion(&mut self, at: DateTime<Utc>) {
        let complete = Self::items_complete(&self.items);
        if complete != self.is_completed {
            self.mark_done(complete, at);
        }
    }

    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut WorkoutItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }
}

impl TrackedItem for Workout {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Completable for Workout {
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

impl Entity for Workout {
    const COLLECTION: &'static str = "workouts";
    const DONE_FIELD: Option<&'static str> = Some("isCompleted");

    type Form = WorkoutForm;

    /// Items live in a sub-collection and are attached by the repository.
    fn decode(doc: &Document) -> Self {
        let r = doc.reader();
        Workout {
            id: doc.id.clone(),
            name: r.string("name"),
            day: r.string_or("day", DEFAULT_DAY),
            duration_min: r.int("durationMin"),
            instructions: r.string("instructions"),
            required_equipment: r.string_list("requiredEquipment"),
            image_url: r.opt_string("imageUrl"),
            is_completed: r.bool("isCompleted"),
            created_at: r.timestamp("createdAt"),
            completed_at: r.timestamp("completedAt"),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkoutItem {
    #[serde(default)]
    pub exercise_id: String,
    pub title: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub sets: i64,
    #[serde(default)]
    pub reps: i64,
    #[serde(default)]
    pub notes: String,
}

impl IntoFields for NewWorkoutItem {
    fn into_fields(self) -> Fields {
        let title = match self.title.trim() {
            "" => DEFAULT_ITEM_TITLE.to_string(),
            other => other.to_string(),
        };
        let mut fields = Fields::new();
        fields.insert("exerciseId".into(), json!(self.exercise_id));
        fields.insert("title".into(), json!(title));
        fields.insert("order".into(), json!(self.order));
        fields.insert("sets".into(), json!(self.sets));
        fields.insert("reps".into(), json!(self.reps));
        fields.insert("notes".into(), json!(self.notes.trim()));
        fields
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkoutForm {
    pub name: String,
    #[serde(default)]
    pub day: String,
    #[serde(default)]
    pub duration_min: String,
    #[serde(default)]
    pub instructions: String,
    /// Comma-separated.
    #[serde(default)]
    pub required_equipment: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub items: Vec<NewWorkoutItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkout {
    pub name: String,
    pub day: String,
    pub duration_min: i64,
    pub instructions: String,
    pub required_equipment: Vec<String>,
    pub image_url: Option<String>,
    pub items: Vec<NewWorkoutItem>,
}

impl Form for WorkoutForm {
    type Record = NewWorkout;

    const SAVED_MESSAGE: &'static str = "Workout saved";

    fn validate(self) -> Result<NewWorkout, AppError> {
        let name = required(&self.name, "Workout name required")?;
        let day = match self.day.trim() {
            "" => DEFAULT_DAY.to_string(),
            other => other.to_string(),
        };
        let required_equipment = self
            .required_equipment
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let mut items = self.items;
        items.sort_by_key(|item| item.order);

        Ok(NewWorkout {
            name,
            day,
            duration_min: int_or_zero(&self.duration_min),
            instructions: self.instructions.trim().to_string(),
            required_equipment,
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
            items,
        })
    }
}

/// Workout fields only; items are written separately.
impl IntoFields for NewWorkout {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(self.name));
        fields.insert("day".into(), json!(self.day));
        fields.insert("durationMin".into(), json!(self.duration_min));
        fields.insert("instructions".into(), json!(self.instructions));
        fields.insert("requiredEquipment".into(), json!(self.required_equipment));
        fields.insert("imageUrl".into(), json!(self.image_url));
        fields
    }
}

/// Plain-text summary for sharing a workout or building a reminder.
pub fn checklist_text(workout: &Workout) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Workout: {}", workout.name);
    let _ = writeln!(out, "Day: {}", workout.day);
    let _ = writeln!(out, "Duration: {} min", workout.duration_min);
    out.push('\n');

    if !workout.required_equipment.is_empty() {
        out.push_str("Required Equipment:\n");
        for equipment in &workout.required_equipment {
            let _ = writeln!(out, "- {}", equipment);
        }
        out.push('\n');
    }

    out.push_str("Exercise Checklist:\n");
    let mut items: Vec<&WorkoutItem> = workout.items.iter().collect();
    items.sort_by_key(|item| item.order);
    for item in items {
        let mark = if item.is_done { "✅" } else { "⬜" };
        let _ = writeln!(
            out,
            "{} {} (Sets {} x Reps {})",
            mark, item.title, item.sets, item.reps
        );
    }

    if !workout.instructions.trim().is_empty() {
        let _ = write!(out, "\nInstructions:\n{}\n", workout.instructions);
    }

    out
}
