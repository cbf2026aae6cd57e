use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

/// The six field kinds a form can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Dropdown,
    Checkbox,
    File,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Dropdown => "dropdown",
            FieldType::Checkbox => "checkbox",
            FieldType::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<FieldType> {
        match s {
            "text" => Some(FieldType::Text),
            "number" => Some(FieldType::Number),
            "date" => Some(FieldType::Date),
            "dropdown" => Some(FieldType::Dropdown),
            "checkbox" => Some(FieldType::Checkbox),
            "file" => Some(FieldType::File),
            _ => None,
        }
    }

    /// Choice types carry a declared option list.
    pub fn is_choice(&self) -> bool {
        matches!(self, FieldType::Dropdown | FieldType::Checkbox)
    }
}

pub const VALIDATION_TYPES: [&str; 4] = ["none", "email", "phone", "regex"];

#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub id: i64,
    pub form_id: i64,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    /// Declared options in display order; empty for non-choice fields and
    /// for option-less checkboxes (plain boolean toggles).
    pub options: Vec<String>,
    pub validation_type: String,
    pub validation_rule: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: i64,
}

impl Field {
    /// True when analytics should produce an option breakdown for this field:
    /// dropdowns always declare options, checkboxes only in multi-select form.
    pub fn has_option_breakdown(&self) -> bool {
        self.field_type.is_choice() && !self.options.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub struct NewField {
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default = "default_validation_type")]
    pub validation_type: String,
    #[serde(default)]
    pub validation_rule: Option<String>,
    /// Explicit display position; appended after the last field when omitted.
    #[serde(rename = "order")]
    pub sort_order: Option<i64>,
}

fn default_validation_type() -> String {
    "none".to_string()
}

fn row_to_field(row: &rusqlite::Row) -> rusqlite::Result<Field> {
    let type_str: String = row.get("field_type")?;
    let options_json: Option<String> = row.get("options")?;
    Ok(Field {
        id: row.get("id")?,
        form_id: row.get("form_id")?,
        label: row.get("label")?,
        // Unknown type strings should be impossible (writes validate), but a
        // hand-edited database falls back to text rather than erroring.
        field_type: FieldType::parse(&type_str).unwrap_or(FieldType::Text),
        required: row.get("required")?,
        options: options_json
            .and_then(|j| serde_json::from_str(&j).ok())
            .unwrap_or_default(),
        validation_type: row.get("validation_type")?,
        validation_rule: row.get("validation_rule")?,
        sort_order: row.get("sort_order")?,
    })
}

const SELECT_FIELD: &str = "\
    SELECT id, form_id, label, field_type, required, options, \
           validation_type, validation_rule, sort_order \
    FROM fields";

pub fn create(conn: &Connection, form_id: i64, field: &NewField) -> rusqlite::Result<i64> {
    let sort_order = match field.sort_order {
        Some(o) => o,
        None => next_sort_order(conn, form_id)?,
    };
    let options_json = if field.options.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&field.options).unwrap_or_else(|_| "[]".to_string()))
    };
    conn.execute(
        "INSERT INTO fields (form_id, label, field_type, required, options, \
         validation_type, validation_rule, sort_order) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            form_id,
            field.label,
            field.field_type.as_str(),
            field.required,
            options_json,
            field.validation_type,
            field.validation_rule,
            sort_order,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Field>> {
    conn.query_row(
        &format!("{SELECT_FIELD} WHERE id = ?1"),
        params![id],
        row_to_field,
    )
    .optional()
}

/// All fields of a form in display order.
pub fn find_for_form(conn: &Connection, form_id: i64) -> rusqlite::Result<Vec<Field>> {
    let mut stmt =
        conn.prepare(&format!("{SELECT_FIELD} WHERE form_id = ?1 ORDER BY sort_order"))?;
    stmt.query_map(params![form_id], row_to_field)?
        .collect::<Result<Vec<_>, _>>()
}

pub fn update(conn: &Connection, id: i64, field: &NewField) -> rusqlite::Result<bool> {
    let sort_order = match field.sort_order {
        Some(o) => o,
        None => match find_by_id(conn, id)? {
            Some(existing) => existing.sort_order,
            None => return Ok(false),
        },
    };
    let options_json = if field.options.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&field.options).unwrap_or_else(|_| "[]".to_string()))
    };
    let changed = conn.execute(
        "UPDATE fields SET label = ?1, field_type = ?2, required = ?3, options = ?4, \
         validation_type = ?5, validation_rule = ?6, sort_order = ?7 WHERE id = ?8",
        params![
            field.label,
            field.field_type.as_str(),
            field.required,
            options_json,
            field.validation_type,
            field.validation_rule,
            sort_order,
            id,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM fields WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

/// Next free display position for a form (max + 1, starting at 1).
pub fn next_sort_order(conn: &Connection, form_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM fields WHERE form_id = ?1",
        params![form_id],
        |row| row.get(0),
    )
}

/// Whether a display position is already taken within a form, excluding one
/// field id (for updates; pass 0 on create).
pub fn sort_order_taken(
    conn: &Connection,
    form_id: i64,
    sort_order: i64,
    exclude_id: i64,
) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM fields WHERE form_id = ?1 AND sort_order = ?2 AND id != ?3",
        params![form_id, sort_order, exclude_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Number of stored responses referencing a field, across all submissions.
pub fn response_count(conn: &Connection, field_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM field_responses WHERE field_id = ?1",
        params![field_id],
        |row| row.get(0),
    )
}
