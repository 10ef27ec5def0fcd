use chrono::{DateTime, Utc};
use serde_json::Value;

use super::Fields;

/// Lenient accessors over one document. A missing or mistyped field reads as
/// the type's zero value so one bad document never fails a whole listing.
pub struct FieldReader<'a> {
    data: &'a Fields,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a Fields) -> Self {
        Self { data }
    }

    pub fn string(&self, key: &str) -> String {
        self.opt_string(key).unwrap_or_default()
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.opt_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn opt_string(&self, key: &str) -> Option<String> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn int(&self, key: &str) -> i64 {
        self.opt_int(key).unwrap_or(0)
    }

    pub fn opt_int(&self, key: &str) -> Option<i64> {
        match self.data.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn float(&self, key: &str) -> f64 {
        self.data.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn bool(&self, key: &str) -> bool {
        self.data.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// String entries of an array field; non-string entries are skipped.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.data
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// RFC 3339 form used for every stored timestamp.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

/// `Value::Null` for `None`.
pub fn opt_timestamp_value(at: Option<DateTime<Utc>>) -> Value {
    at.map(timestamp_value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[test]
    fn test_missing_and_mistyped_fields_read_as_zero() {
        let data = fields(json!({ "sets": "three", "name": 12, "done": "yes" }));
        let reader = FieldReader::new(&data);

        assert_eq!(reader.string("name"), "");
        assert_eq!(reader.string("absent"), "");
        assert_eq!(reader.int("sets"), 0);
        assert_eq!(reader.float("weight"), 0.0);
        assert!(!reader.bool("done"));
        assert!(reader.timestamp("createdAt").is_none());
        assert!(reader.string_list("equipment").is_empty());
    }

    #[test]
    fn test_well_formed_fields() {
        let data = fields(json!({
            "name": "Squat",
            "sets": 4,
            "weight": 71.5,
            "calories": 320.9,
            "isCompleted": true,
            "createdAt": "2025-01-01T10:00:00+00:00",
            "requiredEquipment": ["Barbell", 3, "Rack"]
        }));
        let reader = FieldReader::new(&data);

        assert_eq!(reader.string("name"), "Squat");
        assert_eq!(reader.int("sets"), 4);
        assert_eq!(reader.int("calories"), 320);
        assert_eq!(reader.float("weight"), 71.5);
        assert!(reader.bool("isCompleted"));
        assert_eq!(
            reader.timestamp("createdAt").map(|t| t.to_rfc3339()),
            Some("2025-01-01T10:00:00+00:00".to_string())
        );
        assert_eq!(reader.string_list("requiredEquipment"), vec!["Barbell", "Rack"]);
        assert_eq!(reader.string_or("day", "Monday"), "Monday");
    }
}
