//! Per-form response analytics.
//!
//! Aggregation is all-or-nothing per request and runs entirely on the read
//! path: two filtered queries (submissions, then responses joined to the
//! same filter), followed by in-memory grouping keyed by field id, linear
//! in the number of matching submissions.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use rusqlite::{Connection, ToSql, params_from_iter};
use serde::Serialize;
use serde_json::{Map, Value};

use super::field::{Field, FieldType};
use super::form::Form;
use super::submission::{Status, SubmissionFilter};

pub const DEFAULT_RECENT_DAYS: i64 = 7;

#[derive(Debug, Serialize)]
pub struct FormAnalytics {
    pub form: FormSummary,
    pub submission_analytics: SubmissionAnalytics,
    pub field_analytics: Vec<FieldAnalytics>,
}

#[derive(Debug, Serialize)]
pub struct FormSummary {
    pub id: i64,
    pub name: String,
    pub total_fields: i64,
}

#[derive(Debug, Serialize)]
pub struct SubmissionAnalytics {
    pub total_submissions: i64,
    /// Matching submissions created within the trailing recency window.
    pub recent_submissions: i64,
    pub status_breakdown: StatusBreakdown,
    pub average_completion_rate: f64,
}

/// Per-status counts; every status is always present, zero-filled.
#[derive(Debug, Default, Serialize)]
pub struct StatusBreakdown {
    pub draft: i64,
    pub submitted: i64,
    pub under_review: i64,
    pub approved: i64,
    pub rejected: i64,
}

impl StatusBreakdown {
    fn bump(&mut self, status: Status) {
        match status {
            Status::Draft => self.draft += 1,
            Status::Submitted => self.submitted += 1,
            Status::UnderReview => self.under_review += 1,
            Status::Approved => self.approved += 1,
            Status::Rejected => self.rejected += 1,
        }
    }

    pub fn total(&self) -> i64 {
        self.draft + self.submitted + self.under_review + self.approved + self.rejected
    }
}

#[derive(Debug, Serialize)]
pub struct FieldAnalytics {
    pub field_id: i64,
    pub field_label: String,
    pub field_type: FieldType,
    pub required: bool,
    pub total_responses: i64,
    pub response_rate: f64,
    /// Selection counts per declared option, in declared order, zero-filled.
    /// Recorded values outside the declared options count toward
    /// `total_responses` but are dropped here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_breakdown: Option<Map<String, Value>>,
    /// true/false counts for option-less checkbox fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkbox_breakdown: Option<CheckboxBreakdown>,
}

#[derive(Debug, Serialize)]
pub struct CheckboxBreakdown {
    #[serde(rename = "true")]
    pub yes: i64,
    #[serde(rename = "false")]
    pub no: i64,
}

struct SubmissionRow {
    id: i64,
    status: Status,
    created_at: String,
}

/// Raw value slots of one response, enough to tally selections and toggles.
struct ResponseFact {
    submission_id: i64,
    text: Option<String>,
    boolean: Option<bool>,
    json: Option<String>,
}

impl ResponseFact {
    /// Option labels this response selected (single value_text or a
    /// value_json array, whichever slot the write populated).
    fn selected_options(&self) -> Vec<String> {
        if let Some(text) = &self.text {
            return vec![text.clone()];
        }
        self.json
            .as_deref()
            .and_then(|j| serde_json::from_str::<Vec<String>>(j).ok())
            .unwrap_or_default()
    }
}

pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Compute the full analytics payload for a form under a filter.
///
/// `fields` must be the form's fields in display order; the output's
/// `field_analytics` follows that order. A form with zero matching
/// submissions yields all-zero rates, never an error.
pub fn compute(
    conn: &Connection,
    form: &Form,
    fields: &[Field],
    filter: &SubmissionFilter,
    recent_days: i64,
) -> rusqlite::Result<FormAnalytics> {
    let submissions = load_submissions(conn, form.id, filter)?;
    let total_submissions = submissions.len() as i64;

    let cutoff = (Utc::now() - Duration::days(recent_days))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    let recent_submissions = submissions
        .iter()
        .filter(|s| s.created_at.as_str() >= cutoff.as_str())
        .count() as i64;

    let mut status_breakdown = StatusBreakdown::default();
    for s in &submissions {
        status_breakdown.bump(s.status);
    }

    // Group responses by field, and track which fields each submission
    // answered for the completion computation.
    let mut by_field: HashMap<i64, Vec<ResponseFact>> = HashMap::new();
    let mut answered: HashMap<i64, HashSet<i64>> = HashMap::new();
    for (field_id, fact) in load_responses(conn, form.id, filter)? {
        answered
            .entry(fact.submission_id)
            .or_default()
            .insert(field_id);
        by_field.entry(field_id).or_default().push(fact);
    }

    let average_completion_rate =
        completion_rate(&submissions, &answered, fields);

    let field_analytics = fields
        .iter()
        .map(|field| {
            let facts = by_field.get(&field.id).map_or(&[][..], |v| v.as_slice());
            analyze_field(field, facts, total_submissions)
        })
        .collect();

    Ok(FormAnalytics {
        form: FormSummary {
            id: form.id,
            name: form.name.clone(),
            total_fields: fields.len() as i64,
        },
        submission_analytics: SubmissionAnalytics {
            total_submissions,
            recent_submissions,
            status_breakdown,
            average_completion_rate,
        },
        field_analytics,
    })
}

/// Mean over matching submissions of (answered required fields / required
/// fields × 100), one decimal. Zero submissions → 0.0; a form without any
/// required fields counts every submission as fully complete.
fn completion_rate(
    submissions: &[SubmissionRow],
    answered: &HashMap<i64, HashSet<i64>>,
    fields: &[Field],
) -> f64 {
    if submissions.is_empty() {
        return 0.0;
    }
    let required_ids: HashSet<i64> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.id)
        .collect();

    let sum: f64 = submissions
        .iter()
        .map(|s| {
            if required_ids.is_empty() {
                return 100.0;
            }
            let answered_required = answered
                .get(&s.id)
                .map_or(0, |set| set.intersection(&required_ids).count());
            answered_required as f64 / required_ids.len() as f64 * 100.0
        })
        .sum();
    round1(sum / submissions.len() as f64)
}

fn analyze_field(field: &Field, facts: &[ResponseFact], total_submissions: i64) -> FieldAnalytics {
    let total_responses = facts.len() as i64;
    let response_rate = if total_submissions == 0 {
        0.0
    } else {
        round1(total_responses as f64 / total_submissions as f64 * 100.0)
    };

    let mut analytics = FieldAnalytics {
        field_id: field.id,
        field_label: field.label.clone(),
        field_type: field.field_type,
        required: field.required,
        total_responses,
        response_rate,
        option_breakdown: None,
        checkbox_breakdown: None,
    };

    if field.has_option_breakdown() {
        let mut tally: HashMap<&str, i64> =
            field.options.iter().map(|o| (o.as_str(), 0)).collect();
        for fact in facts {
            for option in fact.selected_options() {
                // Off-catalog values (options edited after submission) are
                // dropped from the breakdown.
                if let Some(count) = tally.get_mut(option.as_str()) {
                    *count += 1;
                }
            }
        }
        let breakdown: Map<String, Value> = field
            .options
            .iter()
            .map(|o| (o.clone(), Value::from(tally[o.as_str()])))
            .collect();
        analytics.option_breakdown = Some(breakdown);
    } else if field.field_type == FieldType::Checkbox {
        analytics.checkbox_breakdown = Some(CheckboxBreakdown {
            yes: facts.iter().filter(|f| f.boolean == Some(true)).count() as i64,
            no: facts.iter().filter(|f| f.boolean == Some(false)).count() as i64,
        });
    }

    analytics
}

fn load_submissions(
    conn: &Connection,
    form_id: i64,
    filter: &SubmissionFilter,
) -> rusqlite::Result<Vec<SubmissionRow>> {
    let (clause, clause_binds) = filter.clause();
    let mut binds: Vec<Box<dyn ToSql>> = vec![Box::new(form_id)];
    binds.extend(clause_binds);

    let sql = format!(
        "SELECT s.id, s.status, s.created_at FROM submissions s \
         WHERE s.form_id = ?{clause} ORDER BY s.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(params_from_iter(binds.iter().map(|b| b.as_ref())), |row| {
        let status_str: String = row.get("status")?;
        Ok(SubmissionRow {
            id: row.get("id")?,
            status: Status::parse(&status_str).unwrap_or(Status::Draft),
            created_at: row.get("created_at")?,
        })
    })?
    .collect::<Result<Vec<_>, _>>()
}

fn load_responses(
    conn: &Connection,
    form_id: i64,
    filter: &SubmissionFilter,
) -> rusqlite::Result<Vec<(i64, ResponseFact)>> {
    let (clause, clause_binds) = filter.clause();
    let mut binds: Vec<Box<dyn ToSql>> = vec![Box::new(form_id)];
    binds.extend(clause_binds);

    let sql = format!(
        "SELECT r.field_id, r.submission_id, r.value_text, r.value_boolean, r.value_json \
         FROM field_responses r \
         JOIN submissions s ON s.id = r.submission_id \
         WHERE s.form_id = ?{clause}"
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(params_from_iter(binds.iter().map(|b| b.as_ref())), |row| {
        Ok((
            row.get::<_, i64>("field_id")?,
            ResponseFact {
                submission_id: row.get("submission_id")?,
                text: row.get("value_text")?,
                boolean: row.get("value_boolean")?,
                json: row.get("value_json")?,
            },
        ))
    })?
    .collect::<Result<Vec<_>, _>>()
}
