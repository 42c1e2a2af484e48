//! Mapping between the external record shape (flat fields, ISO-8601 strings,
//! nullable dates) and the internal model. Applied on read by both backends
//! so nothing downstream sees backend-specific shapes. Never errors: missing
//! or malformed fields degrade to defaults.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Category, Task};

/// External task record as it appears on the wire and in durable blobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Server-assigned creation time; read-only fallback for `created_at`.
    #[serde(rename = "CreatedOn", default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
}

/// External category record. The remote table capitalizes `Name`; local
/// blobs written by older builds used lowercase, hence the alias.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRecord {
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Name", alias = "name", default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub task_count: u32,
}

/// Lenient day parse: plain `YYYY-MM-DD` first, else the date part of an
/// RFC 3339 stamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Shape an external record into the internal model. `now` anchors the
/// final created_at fallback so the function stays pure.
pub fn task_from_record(record: &TaskRecord, now: DateTime<Utc>) -> Task {
    let created_at = record
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| record.created_on.as_deref().and_then(parse_timestamp))
        .unwrap_or(now);

    // completed and completed_at move together; a completed record that
    // arrives without a stamp gets its creation time as the best anchor.
    let completed_at = if record.completed {
        record
            .completed_at
            .as_deref()
            .and_then(parse_timestamp)
            .or(Some(created_at))
    } else {
        None
    };

    Task {
        id: record.id.clone().unwrap_or_default(),
        title: record.title.clone(),
        notes: record.notes.clone(),
        priority: record.priority.parse().unwrap_or_default(),
        category: record.category.clone(),
        due_date: record.due_date.as_deref().and_then(parse_date),
        completed: record.completed,
        created_at,
        completed_at,
    }
}

pub fn task_to_record(task: &Task) -> TaskRecord {
    TaskRecord {
        id: Some(task.id.clone()),
        title: task.title.clone(),
        notes: task.notes.clone(),
        completed: task.completed,
        priority: task.priority.as_str().to_string(),
        category: task.category.clone(),
        due_date: task.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
        created_at: Some(task.created_at.to_rfc3339()),
        completed_at: task.completed_at.map(|dt| dt.to_rfc3339()),
        created_on: None,
    }
}

pub fn category_from_record(record: &CategoryRecord, fallback_color: &str) -> Category {
    Category {
        id: record.id.clone().unwrap_or_default(),
        name: record.name.clone(),
        color: record
            .color
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| fallback_color.to_string()),
        task_count: record.task_count,
    }
}

pub fn category_to_record(category: &Category) -> CategoryRecord {
    CategoryRecord {
        id: Some(category.id.clone()),
        name: category.name.clone(),
        color: Some(category.color.clone()),
        task_count: category.task_count,
    }
}
