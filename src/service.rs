use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::config::AppConfig;
use crate::error::{StoreError, StoreResult};
use crate::metrics::{self, TaskStats};
use crate::model::{
    Category, CategoryDraft, CategoryPatch, CategorySelector, Task, TaskDraft, TaskPatch,
};
use crate::store::{self, BatchOutcome, CategoryStore, TaskStore};
use crate::view;

/// What one read of the system looks like: the projected task list for the
/// active selector and query, the category list, and the summary numbers.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub stats: TaskStats,
}

/// Front door over the configured backend pair. Mutations return only the
/// affected record; callers re-snapshot afterwards — the working set is
/// always a full reload, never a client-side merge.
#[derive(Clone)]
pub struct TaskflowService {
    tasks: Arc<dyn TaskStore>,
    categories: Arc<dyn CategoryStore>,
}

impl TaskflowService {
    pub fn new(tasks: Arc<dyn TaskStore>, categories: Arc<dyn CategoryStore>) -> Self {
        Self { tasks, categories }
    }

    pub async fn from_config(config: &AppConfig) -> StoreResult<Self> {
        let (tasks, categories) = store::connect(config).await?;
        Ok(Self::new(tasks, categories))
    }

    /// Project the collection for the given selector/query against an
    /// explicit calendar day. Pure with respect to `today`, so tests can
    /// pin the clock.
    pub async fn snapshot_at(
        &self,
        selector: &CategorySelector,
        query: &str,
        today: NaiveDate,
    ) -> StoreResult<ViewSnapshot> {
        let all_tasks = self.tasks.get_all().await?;
        let categories = self.categories.get_all().await?;
        let stats = metrics::compute_stats(&all_tasks, today);
        let tasks = view::project(&all_tasks, selector, query, today);
        Ok(ViewSnapshot {
            tasks,
            categories,
            stats,
        })
    }

    /// [`snapshot_at`](Self::snapshot_at) anchored to the local calendar day.
    pub async fn snapshot(
        &self,
        selector: &CategorySelector,
        query: &str,
    ) -> StoreResult<ViewSnapshot> {
        self.snapshot_at(selector, query, Local::now().date_naive())
            .await
    }

    pub async fn create_task(&self, draft: TaskDraft) -> StoreResult<Task> {
        self.tasks.create(draft).await
    }

    pub async fn import_tasks(&self, drafts: Vec<TaskDraft>) -> StoreResult<BatchOutcome<Task>> {
        self.tasks.create_many(drafts).await
    }

    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        self.tasks.update(id, patch).await
    }

    /// Flip `completed` through a patch so the completed_at pairing is
    /// handled by the same path on either backend.
    pub async fn toggle_completed(&self, id: &str) -> StoreResult<Task> {
        let existing = self
            .tasks
            .get_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("task {id}")))?;
        let patch = TaskPatch {
            completed: Some(!existing.completed),
            ..Default::default()
        };
        self.tasks.update(id, patch).await
    }

    pub async fn delete_task(&self, id: &str) -> StoreResult<bool> {
        self.tasks.delete(id).await
    }

    pub async fn fetch_task(&self, id: &str) -> StoreResult<Option<Task>> {
        self.tasks.get_by_id(id).await
    }

    pub async fn create_category(&self, draft: CategoryDraft) -> StoreResult<Category> {
        self.categories.create(draft).await
    }

    pub async fn update_category(&self, id: &str, patch: CategoryPatch) -> StoreResult<Category> {
        self.categories.update(id, patch).await
    }

    pub async fn delete_category(&self, id: &str) -> StoreResult<bool> {
        self.categories.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use crate::store::LocalStore;
    use tempfile::TempDir;

    async fn service_with_temp_dir() -> (TaskflowService, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).unwrap();
        let store = Arc::new(LocalStore::open(&config).await.unwrap());
        (TaskflowService::new(store.clone(), store), dir)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[tokio::test]
    async fn snapshot_reflects_created_task() {
        let (service, _guard) = service_with_temp_dir().await;
        let created = service
            .create_task(TaskDraft {
                title: "Plan sprint".into(),
                priority: Priority::High,
                ..Default::default()
            })
            .await
            .unwrap();

        let snapshot = service
            .snapshot_at(&CategorySelector::All, "", today())
            .await
            .unwrap();
        assert!(snapshot.tasks.iter().any(|t| t.id == created.id));
        assert_eq!(snapshot.stats.total, snapshot.tasks.len());
    }

    #[tokio::test]
    async fn search_narrows_snapshot() {
        let (service, _guard) = service_with_temp_dir().await;
        service
            .create_task(TaskDraft {
                title: "Renew passport".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let snapshot = service
            .snapshot_at(&CategorySelector::All, "passport", today())
            .await
            .unwrap();
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.tasks[0].title, "Renew passport");
    }

    #[tokio::test]
    async fn toggle_completed_round_trips_invariant() {
        let (service, _guard) = service_with_temp_dir().await;
        let created = service
            .create_task(TaskDraft {
                title: "Flip me".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let done = service.toggle_completed(&created.id).await.unwrap();
        assert!(done.completed && done.completed_at.is_some());

        let reopened = service.toggle_completed(&created.id).await.unwrap();
        assert!(!reopened.completed && reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn fetch_task_returns_stored_record_or_none() {
        let (service, _guard) = service_with_temp_dir().await;
        let created = service
            .create_task(TaskDraft {
                title: "Find me".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let fetched = service.fetch_task(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Find me");
        assert!(service.fetch_task("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn toggle_unknown_task_is_not_found() {
        let (service, _guard) = service_with_temp_dir().await;
        let result = service.toggle_completed("missing").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn import_reports_partial_success() {
        let (service, _guard) = service_with_temp_dir().await;
        let outcome = service
            .import_tasks(vec![
                TaskDraft {
                    title: "Valid".into(),
                    ..Default::default()
                },
                TaskDraft {
                    title: "   ".into(),
                    ..Default::default()
                },
            ])
            .await
            .unwrap();
        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.is_partial());
    }
}
