//! Local backend: in-process collections seeded from a bundled default
//! dataset, mirrored to one durable JSON blob per entity type. The blob is
//! always a whole-collection snapshot of normalized records; a load failure
//! of any kind falls back to the seeds and is never fatal.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::config::{AppConfig, CATEGORIES_NAMESPACE, DEFAULT_CATEGORY_COLOR, TASKS_NAMESPACE};
use crate::error::{StoreError, StoreResult};
use crate::model::{
    apply_category_patch, apply_task_patch, validated_name, validated_title, Category,
    CategoryDraft, CategoryPatch, Task, TaskDraft, TaskPatch,
};
use crate::normalize::{
    category_from_record, category_to_record, task_from_record, task_to_record, CategoryRecord,
    TaskRecord,
};
use crate::store::{CategoryStore, TaskStore};

static DEFAULT_TASKS: &str = include_str!("../../data/default_tasks.json");
static DEFAULT_CATEGORIES: &str = include_str!("../../data/default_categories.json");

pub struct LocalStore {
    tasks_blob: PathBuf,
    categories_blob: PathBuf,
    tasks: Mutex<Vec<Task>>,
    categories: Mutex<Vec<Category>>,
}

impl LocalStore {
    /// Seed both collections from the bundled dataset, then replace each
    /// with its durable blob when one loads cleanly (last-write-wins, no
    /// merge).
    pub async fn open(config: &AppConfig) -> StoreResult<Self> {
        let now = Utc::now();

        let seed_tasks: Vec<TaskRecord> = serde_json::from_str(DEFAULT_TASKS)?;
        let seed_categories: Vec<CategoryRecord> = serde_json::from_str(DEFAULT_CATEGORIES)?;
        let mut tasks: Vec<Task> = seed_tasks
            .iter()
            .map(|r| task_from_record(r, now))
            .collect();
        let mut categories: Vec<Category> = seed_categories
            .iter()
            .map(|r| category_from_record(r, DEFAULT_CATEGORY_COLOR))
            .collect();

        let tasks_blob = config.blob_path(TASKS_NAMESPACE);
        let categories_blob = config.blob_path(CATEGORIES_NAMESPACE);

        if let Some(stored) = load_blob::<TaskRecord>(&tasks_blob).await {
            tasks = stored.iter().map(|r| task_from_record(r, now)).collect();
        }
        if let Some(stored) = load_blob::<CategoryRecord>(&categories_blob).await {
            categories = stored
                .iter()
                .map(|r| category_from_record(r, DEFAULT_CATEGORY_COLOR))
                .collect();
        }

        Ok(Self {
            tasks_blob,
            categories_blob,
            tasks: Mutex::new(tasks),
            categories: Mutex::new(categories),
        })
    }

    /// Rewrite the task blob with the whole collection. The mutation commits
    /// to memory only after the mirror write succeeds, so a storage failure
    /// leaves the previous state intact.
    async fn persist_tasks(&self, tasks: &[Task]) -> StoreResult<()> {
        let records: Vec<TaskRecord> = tasks.iter().map(task_to_record).collect();
        write_blob(&self.tasks_blob, &records).await
    }

    async fn persist_categories(&self, categories: &[Category]) -> StoreResult<()> {
        let records: Vec<CategoryRecord> = categories.iter().map(category_to_record).collect();
        write_blob(&self.categories_blob, &records).await
    }
}

async fn load_blob<T: serde::de::DeserializeOwned>(path: &Path) -> Option<Vec<T>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "no durable blob, using seeds");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(records) => Some(records),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "corrupt durable blob, using seeds");
            None
        }
    }
}

async fn write_blob<T: serde::Serialize>(path: &Path, records: &[T]) -> StoreResult<()> {
    let raw = serde_json::to_vec_pretty(records)?;
    tokio::fs::write(path, raw)
        .await
        .map_err(|err| StoreError::Unavailable(format!("failed to write {}: {err}", path.display())))
}

#[async_trait]
impl TaskStore for LocalStore {
    async fn get_all(&self) -> StoreResult<Vec<Task>> {
        Ok(self.tasks.lock().await.clone())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.tasks.lock().await.iter().find(|t| t.id == id).cloned())
    }

    async fn create(&self, draft: TaskDraft) -> StoreResult<Task> {
        let title = validated_title(&draft.title)?;
        let now = Utc::now();
        let created_at = draft.created_at.unwrap_or(now);
        let task = Task {
            id: Ulid::new().to_string(),
            title,
            notes: draft.notes,
            priority: draft.priority,
            category: draft.category,
            due_date: draft.due_date,
            completed: draft.completed,
            created_at,
            completed_at: draft.completed.then_some(now),
        };

        let mut tasks = self.tasks.lock().await;
        let mut next = tasks.clone();
        next.push(task.clone());
        self.persist_tasks(&next).await?;
        *tasks = next;
        Ok(task)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        let mut tasks = self.tasks.lock().await;
        let index = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("task {id}")))?;

        let updated = apply_task_patch(&tasks[index], &patch, Utc::now())?;
        let mut next = tasks.clone();
        next[index] = updated.clone();
        self.persist_tasks(&next).await?;
        *tasks = next;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut tasks = self.tasks.lock().await;
        let index = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("task {id}")))?;

        let mut next = tasks.clone();
        next.remove(index);
        self.persist_tasks(&next).await?;
        *tasks = next;
        Ok(true)
    }
}

#[async_trait]
impl CategoryStore for LocalStore {
    async fn get_all(&self) -> StoreResult<Vec<Category>> {
        Ok(self.categories.lock().await.clone())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Category>> {
        Ok(self
            .categories
            .lock()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn create(&self, draft: CategoryDraft) -> StoreResult<Category> {
        let name = validated_name(&draft.name)?;
        let category = Category {
            id: Ulid::new().to_string(),
            name,
            color: draft
                .color
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
            task_count: 0,
        };

        let mut categories = self.categories.lock().await;
        let mut next = categories.clone();
        next.push(category.clone());
        self.persist_categories(&next).await?;
        *categories = next;
        Ok(category)
    }

    async fn update(&self, id: &str, patch: CategoryPatch) -> StoreResult<Category> {
        let mut categories = self.categories.lock().await;
        let index = categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("category {id}")))?;

        let updated = apply_category_patch(&categories[index], &patch)?;
        let mut next = categories.clone();
        next[index] = updated.clone();
        self.persist_categories(&next).await?;
        *categories = next;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut categories = self.categories.lock().await;
        let index = categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("category {id}")))?;

        // Tasks referencing the removed name are retained as-is; the
        // category reference is a weak association, never cascaded.
        let mut next = categories.clone();
        next.remove(index);
        self.persist_categories(&next).await?;
        *categories = next;
        Ok(true)
    }
}
