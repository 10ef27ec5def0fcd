use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Entity, Form, IntoFields, TrackedItem, float_or_zero, required};
use crate::error::AppError;
use crate::store::{Document, Fields};

/// One bodyweight log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: String,
    pub date: String,
    pub weight_kg: f64,
    pub note: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl TrackedItem for ProgressEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Entity for ProgressEntry {
    const COLLECTION: &'static str = "progress";
    const DONE_FIELD: Option<&'static str> = None;

    type Form = ProgressForm;

    fn decode(doc: &Document) -> Self {
        let r = doc.reader();
        ProgressEntry {
            id: doc.id.clone(),
            date: r.string("date"),
            weight_kg: r.float("weightKg"),
            note: r.string("note"),
            created_at: r.timestamp("createdAt"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressForm {
    pub date: String,
    #[serde(default)]
    pub weight_kg: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProgressEntry {
    pub date: String,
    pub weight_kg: f64,
    pub note: String,
}

impl Form for ProgressForm {
    type Record = NewProgressEntry;

    const SAVED_MESSAGE: &'static str = "Progress saved";

    fn validate(self) -> Result<NewProgressEntry, AppError> {
        Ok(NewProgressEntry {
            date: required(&self.date, "Date required (YYYY-MM-DD)")?,
            weight_kg: float_or_zero(&self.weight_kg),
            note: self.note.trim().to_string(),
        })
    }
}

impl IntoFields for NewProgressEntry {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("date".into(), json!(self.date));
        fields.insert("weightKg".into(), json!(self.weight_kg));
        fields.insert("note".into(), json!(self.note));
        fields
    }
}
