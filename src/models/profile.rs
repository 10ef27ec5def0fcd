use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{float_or_zero, int_or_zero, required};
use crate::error::AppError;
use crate::store::{Document, Fields};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub full_name: String,
    pub email: String,
    pub age: i64,
    pub height_cm: i64,
    pub weight_kg: f64,
    pub goal: String,
}

impl UserProfile {
    pub fn decode(doc: &Document) -> Self {
        let r = doc.reader();
        UserProfile {
            full_name: r.string("fullName"),
            email: r.string("email"),
            age: r.int("age"),
            height_cm: r.int("heightCm"),
            weight_kg: r.float("weightKg"),
            goal: r.string("goal"),
        }
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("fullName".into(), json!(self.full_name));
        fields.insert("email".into(), json!(self.email));
        fields.insert("age".into(), json!(self.age));
        fields.insert("heightCm".into(), json!(self.height_cm));
        fields.insert("weightKg".into(), json!(self.weight_kg));
        fields.insert("goal".into(), json!(self.goal));
        fields
    }

    pub fn bmi(&self) -> Option<f64> {
        bmi(self.height_cm as f64, self.weight_kg)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileForm {
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub height_cm: String,
    #[serde(default)]
    pub weight_kg: String,
    #[serde(default)]
    pub goal: String,
}

impl ProfileForm {
    pub fn validate(self) -> Result<UserProfile, AppError> {
        Ok(UserProfile {
            full_name: required(&self.full_name, "Full name required")?,
            email: self.email.trim().to_string(),
            age: int_or_zero(&self.age),
            height_cm: int_or_zero(&self.height_cm),
            weight_kg: float_or_zero(&self.weight_kg),
            goal: self.goal.trim().to_string(),
        })
    }
}

/// kg / m². `None` unless both inputs are positive.
pub fn bmi(height_cm: f64, weight_kg: f64) -> Option<f64> {
    if height_cm <= 0.0 || weight_kg <= 0.0 {
        return None;
    }
    let meters = height_cm / 100.0;
    Some(weight_kg / (meters * meters))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::Normal
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Normal => "Normal",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obese => "Obese",
        }
    }
}
