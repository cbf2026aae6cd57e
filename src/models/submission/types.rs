use chrono::NaiveDate;
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::field::{Field, FieldType};

/// Workflow status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Submitted => "submitted",
            Status::UnderReview => "under_review",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "draft" => Some(Status::Draft),
            "submitted" => Some(Status::Submitted),
            "under_review" => Some(Status::UnderReview),
            "approved" => Some(Status::Approved),
            "rejected" => Some(Status::Rejected),
            _ => None,
        }
    }
}

/// One answer value, tagged by the owning field's type. Replaces the five
/// nullable value columns with a sum type; the storage layer maps each
/// variant back to its single column on write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    /// Option-less checkbox: a plain boolean toggle.
    Toggle(bool),
    /// Single-select choice (dropdown).
    Choice(String),
    /// Multi-select choice (dropdown multi, checkbox with options).
    Choices(Vec<String>),
    /// Filenames attached to a file field.
    Files(Vec<String>),
}

impl FieldValue {
    /// Coerce a raw JSON answer into the value slot for `field`.
    ///
    /// `Ok(None)` means the answer is empty (null, blank string, empty list)
    /// and no response row should be stored. `Err` carries a validation
    /// message; any single mismatch rejects the whole submission.
    pub fn coerce(field: &Field, raw: &Value) -> Result<Option<FieldValue>, String> {
        if raw.is_null() {
            return Ok(None);
        }
        if let Some(s) = raw.as_str() {
            if s.trim().is_empty() {
                return Ok(None);
            }
        }
        if let Some(arr) = raw.as_array() {
            if arr.is_empty() {
                return Ok(None);
            }
        }

        let mismatch = |expected: &str| {
            format!(
                "Field '{}' expects {expected}, got {}",
                field.label,
                type_name(raw)
            )
        };

        match field.field_type {
            FieldType::Text => match raw {
                Value::String(s) => Ok(Some(FieldValue::Text(s.clone()))),
                Value::Number(n) => Ok(Some(FieldValue::Text(n.to_string()))),
                Value::Bool(b) => Ok(Some(FieldValue::Text(b.to_string()))),
                _ => Err(mismatch("a text value")),
            },
            FieldType::Number => match raw {
                Value::Number(n) => n
                    .as_f64()
                    .map(|f| Some(FieldValue::Number(f)))
                    .ok_or_else(|| mismatch("a number")),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(|f| Some(FieldValue::Number(f)))
                    .map_err(|_| format!("Field '{}' expects a number, got '{s}'", field.label)),
                _ => Err(mismatch("a number")),
            },
            FieldType::Date => match raw.as_str() {
                Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(|d| Some(FieldValue::Date(d)))
                    .map_err(|_| {
                        format!("Field '{}' expects a YYYY-MM-DD date, got '{s}'", field.label)
                    }),
                None => Err(mismatch("a YYYY-MM-DD date")),
            },
            FieldType::Checkbox if field.options.is_empty() => match raw {
                Value::Bool(b) => Ok(Some(FieldValue::Toggle(*b))),
                Value::Number(n) => Ok(Some(FieldValue::Toggle(n.as_f64() != Some(0.0)))),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "1" | "yes" | "y" => Ok(Some(FieldValue::Toggle(true))),
                    "false" | "0" | "no" | "n" => Ok(Some(FieldValue::Toggle(false))),
                    _ => Err(format!("Field '{}' expects a boolean, got '{s}'", field.label)),
                },
                _ => Err(mismatch("a boolean")),
            },
            FieldType::Checkbox => {
                // Multi-select checkbox: one or more selected option labels.
                string_list(raw)
                    .map(|list| Some(FieldValue::Choices(list)))
                    .ok_or_else(|| mismatch("selected options"))
            }
            FieldType::Dropdown => match raw {
                Value::String(s) => Ok(Some(FieldValue::Choice(s.clone()))),
                Value::Array(_) => string_list(raw)
                    .map(|list| Some(FieldValue::Choices(list)))
                    .ok_or_else(|| mismatch("selected options")),
                _ => Err(mismatch("a selected option")),
            },
            FieldType::File => string_list(raw)
                .map(|list| Some(FieldValue::Files(list)))
                .ok_or_else(|| mismatch("one or more filenames")),
        }
    }

    /// Option labels selected by this value; empty for non-choice variants.
    pub fn selected_options(&self) -> &[String] {
        match self {
            FieldValue::Choice(s) => std::slice::from_ref(s),
            FieldValue::Choices(list) => list,
            _ => &[],
        }
    }
}

/// Accept a lone string or an array of strings; anything else is None.
fn string_list(raw: &Value) -> Option<Vec<String>> {
    match raw {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub id: i64,
    pub form_id: i64,
    pub submitted_by: String,
    pub status: Status,
    pub submitted_at: Option<String>,
    pub created_at: String,
    pub ip_address: Option<String>,
}

/// Body of POST /api/forms/{id}/submit. Answers arrive either as a map from
/// field labels to values or as an explicit list of field references.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub submitted_by: String,
    #[serde(default)]
    pub answers: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub answers_list: Option<Vec<AnswerItem>>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerItem {
    #[serde(default)]
    pub field_id: Option<i64>,
    #[serde(default)]
    pub field_label: Option<String>,
    pub value: Value,
}

/// AND-combined submission filter shared by listing and analytics reads.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub status: Option<Status>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub submitted_by: Option<String>,
}

impl SubmissionFilter {
    /// SQL fragment (against alias `s`) plus bind values. Placeholders are
    /// positional `?` so the fragment composes after the caller's own binds.
    /// Date bounds are inclusive calendar dates on both ends.
    pub fn clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut sql = String::new();
        let mut binds: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(status) = self.status {
            sql.push_str(" AND s.status = ?");
            binds.push(Box::new(status.as_str().to_string()));
        }
        if let Some(from) = self.date_from {
            sql.push_str(" AND date(s.created_at) >= ?");
            binds.push(Box::new(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.date_to {
            sql.push_str(" AND date(s.created_at) <= ?");
            binds.push(Box::new(to.format("%Y-%m-%d").to_string()));
        }
        if let Some(sub) = &self.submitted_by {
            sql.push_str(" AND s.submitted_by LIKE ?");
            binds.push(Box::new(format!("%{sub}%")));
        }
        (sql, binds)
    }
}
