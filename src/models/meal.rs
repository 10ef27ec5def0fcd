use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Completable, Entity, Form, IntoFields, TrackedItem, int_or_zero, required};
use crate::error::AppError;
use crate::store::{Document, Fields};

pub const DEFAULT_MEAL_TYPE: &str = "Breakfast";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: String,
    pub title: String,
    /// Breakfast, Lunch, Dinner or Snack.
    pub meal_type: String,
    pub calories: i64,
    pub notes: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub is_completed: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TrackedItem for Meal {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Completable for Meal {
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

impl Entity for Meal {
    const COLLECTION: &'static str = "meals";
    const DONE_FIELD: Option<&'static str> = Some("isCompleted");

    type Form = MealForm;

    fn decode(doc: &Document) -> Self {
        let r = doc.reader();
        Meal {
            id: doc.id.clone(),
            title: r.string("title"),
            meal_type: r.string_or("mealType", DEFAULT_MEAL_TYPE),
            calories: r.int("calories"),
            notes: r.string("notes"),
            date: r.string("date"),
            is_completed: r.bool("isCompleted"),
            created_at: r.timestamp("createdAt"),
            completed_at: r.timestamp("completedAt"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealForm {
    pub title: String,
    #[serde(default)]
    pub meal_type: String,
    #[serde(default)]
    pub calories: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeal {
    pub title: String,
    pub meal_type: String,
    pub calories: i64,
    pub notes: String,
    pub date: String,
}

impl Form for MealForm {
    type Record = NewMeal;

    const SAVED_MESSAGE: &'static str = "Meal saved";

    fn validate(self) -> Result<NewMeal, AppError> {
        let title = required(&self.title, "Meal name required")?;
        let date = required(&self.date, "Date required (YYYY-MM-DD)")?;
        let meal_type = match self.meal_type.trim() {
            "" => DEFAULT_MEAL_TYPE.to_string(),
            other => other.to_string(),
        };

        Ok(NewMeal {
            title,
            meal_type,
            calories: int_or_zero(&self.calories),
            notes: self.notes.trim().to_string(),
            date,
        })
    }
}

impl IntoFields for NewMeal {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".into(), json!(self.title));
        fields.insert("mealType".into(), json!(self.meal_type));
        fields.insert("calories".into(), json!(self.calories));
        fields.insert("notes".into(), json!(self.notes));
        fields.insert("date".into(), json!(self.date));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_title_checked_before_date() {
        let err = MealForm {
            title: String::new(),
            date: "2025-01-01".into(),
            ..Default::default()
        }
        .validate()
        .expect_err("empty title");
        assert_eq!(err.to_string(), "Meal name required");

        let err = MealForm {
            title: "Oats".into(),
            date: "  ".into(),
            ..Default::default()
        }
        .validate()
        .expect_err("empty date");
        assert_eq!(err.to_string(), "Date required (YYYY-MM-DD)");
    }

    #[test]
    fn test_defaults() {
        let meal = MealForm {
            title: "Oats".into(),
            calories: "lots".into(),
            date: "2025-01-01".into(),
            ..Default::default()
        }
        .validate()
        .expect("valid");
        assert_eq!(meal.meal_type, "Breakfast");
        assert_eq!(meal.calories, 0);
    }

    #[test]
    fn test_decode_tolerates_bad_fields() {
        let data = match json!({ "title": 5, "calories": "many", "mealType": null }) {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        let meal = Meal::decode(&Document {
            id: "m1".into(),
            collection: "users/u/meals".into(),
            data,
        });
        assert_eq!(meal.id, "m1");
        assert_eq!(meal.title, "");
        assert_eq!(meal.calories, 0);
        assert_eq!(meal.meal_type, "Breakfast");
        assert!(!meal.is_completed);
    }
}
