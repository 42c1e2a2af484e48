use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Numeric rank for ordering: high > medium > low.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" | "med" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(anyhow!(
                "Unknown priority '{}': expected high|medium|low",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub notes: String,
    pub priority: Priority,
    /// Weak reference to a [`Category`] by name. Never enforced; a task may
    /// keep naming a category that no longer exists.
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Advisory only. The metrics layer recomputes real counts by scanning
    /// tasks instead of trusting this field.
    pub task_count: u32,
}

/// Caller-supplied fields for a task that does not exist yet. Store-assigned
/// fields (id, created_at when absent) are filled in by the backend.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub notes: String,
    pub priority: Priority,
    pub category: String,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryDraft {
    pub name: String,
    pub color: Option<String>,
}

/// Partial update for a task. `None` means "leave the field alone"; for the
/// due date the inner option distinguishes clearing from preserving.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.notes.is_none()
            && self.priority.is_none()
            && self.category.is_none()
            && self.due_date.is_none()
            && self.completed.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// Which slice of the collection a view asks for. `Today`, `Overdue`, and
/// `All` are virtual selectors that cut across stored categories; anything
/// else matches a category name exactly (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategorySelector {
    #[default]
    All,
    Today,
    Overdue,
    Named(String),
}

impl FromStr for CategorySelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "all" => CategorySelector::All,
            "today" => CategorySelector::Today,
            "overdue" => CategorySelector::Overdue,
            other => CategorySelector::Named(other.to_string()),
        })
    }
}

impl fmt::Display for CategorySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategorySelector::All => write!(f, "all"),
            CategorySelector::Today => write!(f, "today"),
            CategorySelector::Overdue => write!(f, "overdue"),
            CategorySelector::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Trim and reject empty. Shared by both backends so the validation rule
/// cannot diverge between them.
pub fn validated_title(raw: &str) -> StoreResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation("title must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

pub fn validated_name(raw: &str) -> StoreResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation(
            "category name must not be empty".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Merge a patch onto an existing task. Fields absent from the patch are
/// preserved. Maintains the invariant that `completed` and `completed_at`
/// change together: a false->true transition stamps `now`, true->false
/// clears the stamp. `created_at` is never touched.
pub fn apply_task_patch(existing: &Task, patch: &TaskPatch, now: DateTime<Utc>) -> StoreResult<Task> {
    let title = match &patch.title {
        Some(raw) => validated_title(raw)?,
        None => existing.title.clone(),
    };

    let completed = patch.completed.unwrap_or(existing.completed);
    let completed_at = match (existing.completed, completed) {
        (false, true) => Some(now),
        (true, false) => None,
        _ => existing.completed_at,
    };

    Ok(Task {
        id: existing.id.clone(),
        title,
        notes: patch.notes.clone().unwrap_or_else(|| existing.notes.clone()),
        priority: patch.priority.unwrap_or(existing.priority),
        category: patch
            .category
            .clone()
            .unwrap_or_else(|| existing.category.clone()),
        due_date: patch.due_date.unwrap_or(existing.due_date),
        completed,
        created_at: existing.created_at,
        completed_at,
    })
}

pub fn apply_category_patch(existing: &Category, patch: &CategoryPatch) -> StoreResult<Category> {
    let name = match &patch.name {
        Some(raw) => validated_name(raw)?,
        None => existing.name.clone(),
    };
    Ok(Category {
        id: existing.id.clone(),
        name,
        color: patch.color.clone().unwrap_or_else(|| existing.color.clone()),
        task_count: existing.task_count,
    })
}
