pub mod local;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{AppConfig, BackendKind};
use crate::error::{StoreError, StoreResult};
use crate::model::{
    Category, CategoryDraft, CategoryPatch, Task, TaskDraft, TaskPatch,
};

pub use local::LocalStore;
pub use remote::RemoteTableStore;

/// Per-record failure surfaced by a batch write. Non-fatal as long as at
/// least one record in the batch succeeded.
#[derive(Debug, Clone)]
pub struct RecordFailure {
    pub message: String,
}

/// Structured result of a batch write, distinguishing "all succeeded" from
/// "partially succeeded". A batch with zero successes never reaches the
/// caller as an outcome; it is reported as an error instead.
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failures: Vec<RecordFailure>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn is_partial(&self) -> bool {
        !self.succeeded.is_empty() && !self.failures.is_empty()
    }
}

/// Uniform CRUD contract over task records. Both backends implement exactly
/// this surface; callers never see which one they are driving.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Every task, normalized. An empty collection is an empty vec, not an
    /// error.
    async fn get_all(&self) -> StoreResult<Vec<Task>>;

    /// `Ok(None)` for an unknown id — absence is not an error here.
    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Task>>;

    async fn create(&self, draft: TaskDraft) -> StoreResult<Task>;

    async fn update(&self, id: &str, patch: TaskPatch) -> StoreResult<Task>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;

    /// Batch create. The default implementation loops [`TaskStore::create`],
    /// folding per-record errors into failures; backends with a native batch
    /// endpoint override it.
    async fn create_many(&self, drafts: Vec<TaskDraft>) -> StoreResult<BatchOutcome<Task>> {
        let mut outcome = BatchOutcome::default();
        let mut first_error = None;
        for draft in drafts {
            match self.create(draft).await {
                Ok(task) => outcome.succeeded.push(task),
                Err(err) => {
                    outcome.failures.push(RecordFailure {
                        message: err.to_string(),
                    });
                    first_error.get_or_insert(err);
                }
            }
        }
        if outcome.succeeded.is_empty() {
            if let Some(err) = first_error {
                return Err(err);
            }
        }
        for failure in &outcome.failures {
            tracing::warn!(message = %failure.message, "record failed in batch create");
        }
        Ok(outcome)
    }
}

/// Category counterpart of [`TaskStore`]; `name` plays the role `title`
/// plays for tasks (non-empty constraint).
#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn get_all(&self) -> StoreResult<Vec<Category>>;

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Category>>;

    async fn create(&self, draft: CategoryDraft) -> StoreResult<Category>;

    async fn update(&self, id: &str, patch: CategoryPatch) -> StoreResult<Category>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;
}

/// Open the backend pair named by the configuration. Selection happens here,
/// once, at startup — nothing downstream switches backends implicitly.
pub async fn connect(
    config: &AppConfig,
) -> StoreResult<(Arc<dyn TaskStore>, Arc<dyn CategoryStore>)> {
    match config.backend() {
        BackendKind::Local => {
            let store = Arc::new(LocalStore::open(config).await?);
            let tasks: Arc<dyn TaskStore> = store.clone();
            let categories: Arc<dyn CategoryStore> = store;
            Ok((tasks, categories))
        }
        BackendKind::Remote => {
            let base_url = config.remote_url().ok_or_else(|| {
                StoreError::Unavailable(
                    "remote backend selected but no remote URL configured".into(),
                )
            })?;
            let store = Arc::new(RemoteTableStore::new(base_url)?);
            let tasks: Arc<dyn TaskStore> = store.clone();
            let categories: Arc<dyn CategoryStore> = store;
            Ok((tasks, categories))
        }
    }
}
