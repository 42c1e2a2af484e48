//! Remote backend: CRUD against a request/response table API. Writes carry
//! only the updatable fields being changed plus the record id; reads are
//! normalized before anything downstream sees them. The envelope's
//! top-level "accepted" flag is distinct from per-record success — a write
//! whose results contain zero successes is a failed operation, while a
//! partial batch returns the successful subset and logs the rest.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    apply_category_patch, apply_task_patch, validated_name, validated_title, Category,
    CategoryDraft, CategoryPatch, Task, TaskDraft, TaskPatch,
};
use crate::normalize::{category_from_record, task_from_record, CategoryRecord, TaskRecord};
use crate::store::{BatchOutcome, CategoryStore, RecordFailure, TaskStore};

static TASKS_TABLE: &str = "task";
static CATEGORIES_TABLE: &str = "category";

pub struct RemoteTableStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct WriteEnvelope<T> {
    #[serde(default = "Vec::new")]
    results: Vec<RecordResult<T>>,
}

#[derive(Debug, Deserialize)]
struct RecordResult<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct WritePayload {
    records: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct DeletePayload {
    #[serde(rename = "RecordIds")]
    record_ids: Vec<String>,
}

impl RemoteTableStore {
    pub fn new(base_url: &str) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| StoreError::Unavailable(format!("http client error: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn records_url(&self, table: &str) -> String {
        format!("{}/tables/{}/records", self.base_url, table)
    }

    fn record_url(&self, table: &str, id: &str) -> String {
        format!("{}/tables/{}/records/{}", self.base_url, table, id)
    }

    async fn fetch_list<T: DeserializeOwned>(&self, table: &str) -> StoreResult<Vec<T>> {
        let url = self.records_url(table);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Unavailable(format!(
                "GET {url} returned {status}"
            )));
        }
        let envelope: ListEnvelope<T> = response.json().await?;
        if !envelope.success {
            return Err(StoreError::Unavailable(
                envelope
                    .message
                    .unwrap_or_else(|| format!("fetch from table {table} rejected")),
            ));
        }
        Ok(envelope.data)
    }

    async fn fetch_record<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> StoreResult<Option<T>> {
        let url = self.record_url(table, id);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Unavailable(format!(
                "GET {url} returned {status}"
            )));
        }
        let envelope: RecordEnvelope<T> = response.json().await?;
        if !envelope.success {
            return Ok(None);
        }
        Ok(envelope.data)
    }

    async fn send_write<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> StoreResult<Vec<RecordResult<T>>> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Unavailable(format!(
                "write returned {status}"
            )));
        }
        let envelope: WriteEnvelope<T> = response.json().await?;
        Ok(envelope.results)
    }
}

/// Partition per-record results into normalized successes and failures.
fn split_task_results(
    results: Vec<RecordResult<TaskRecord>>,
    now: chrono::DateTime<Utc>,
) -> (Vec<Task>, Vec<RecordFailure>) {
    let mut succeeded = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match (result.success, result.data) {
            (true, Some(record)) => succeeded.push(task_from_record(&record, now)),
            _ => failures.push(RecordFailure {
                message: result
                    .message
                    .unwrap_or_else(|| "record rejected by remote table".into()),
            }),
        }
    }
    (succeeded, failures)
}

fn failure_summary(failures: &[RecordFailure]) -> String {
    failures
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Updatable fields for a create. Server-assigned fields (Id, CreatedOn)
/// never appear in the payload.
fn task_create_fields(draft: &TaskDraft, title: &str) -> Value {
    let mut fields = Map::new();
    fields.insert("title".into(), json!(title));
    fields.insert("notes".into(), json!(draft.notes));
    fields.insert("completed".into(), json!(draft.completed));
    fields.insert("priority".into(), json!(draft.priority.as_str()));
    fields.insert("category".into(), json!(draft.category));
    if let Some(due) = draft.due_date {
        fields.insert("due_date".into(), json!(due.format("%Y-%m-%d").to_string()));
    }
    if let Some(created_at) = draft.created_at {
        fields.insert("created_at".into(), json!(created_at.to_rfc3339()));
    }
    Value::Object(fields)
}

/// Only the fields the patch touched, plus the record id. Toggling
/// `completed` also carries the recomputed `completed_at` so the pairing
/// invariant holds on the server copy.
fn task_patch_fields(id: &str, merged: &Task, patch: &TaskPatch) -> Value {
    let mut fields = Map::new();
    fields.insert("Id".into(), json!(id));
    if patch.title.is_some() {
        fields.insert("title".into(), json!(merged.title));
    }
    if patch.notes.is_some() {
        fields.insert("notes".into(), json!(merged.notes));
    }
    if patch.priority.is_some() {
        fields.insert("priority".into(), json!(merged.priority.as_str()));
    }
    if patch.category.is_some() {
        fields.insert("category".into(), json!(merged.category));
    }
    if patch.due_date.is_some() {
        let due = merged.due_date.map(|d| d.format("%Y-%m-%d").to_string());
        fields.insert("due_date".into(), json!(due));
    }
    if patch.completed.is_some() {
        fields.insert("completed".into(), json!(merged.completed));
        let stamp = merged.completed_at.map(|dt| dt.to_rfc3339());
        fields.insert("completed_at".into(), json!(stamp));
    }
    Value::Object(fields)
}

fn category_create_fields(draft: &CategoryDraft, name: &str) -> Value {
    let mut fields = Map::new();
    fields.insert("Name".into(), json!(name));
    if let Some(color) = &draft.color {
        fields.insert("color".into(), json!(color));
    }
    fields.insert("task_count".into(), json!(0));
    Value::Object(fields)
}

fn category_patch_fields(id: &str, merged: &Category, patch: &CategoryPatch) -> Value {
    let mut fields = Map::new();
    fields.insert("Id".into(), json!(id));
    if patch.name.is_some() {
        fields.insert("Name".into(), json!(merged.name));
    }
    if patch.color.is_some() {
        fields.insert("color".into(), json!(merged.color));
    }
    Value::Object(fields)
}

#[async_trait]
impl TaskStore for RemoteTableStore {
    async fn get_all(&self) -> StoreResult<Vec<Task>> {
        let now = Utc::now();
        let records: Vec<TaskRecord> = self.fetch_list(TASKS_TABLE).await?;
        Ok(records.iter().map(|r| task_from_record(r, now)).collect())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        let record: Option<TaskRecord> = self.fetch_record(TASKS_TABLE, id).await?;
        Ok(record.map(|r| task_from_record(&r, Utc::now())))
    }

    async fn create(&self, draft: TaskDraft) -> StoreResult<Task> {
        let title = validated_title(&draft.title)?;
        let payload = WritePayload {
            records: vec![task_create_fields(&draft, &title)],
        };
        let results = self
            .send_write(self.client.post(self.records_url(TASKS_TABLE)).json(&payload))
            .await?;
        let (mut succeeded, failures) = split_task_results(results, Utc::now());
        match succeeded.pop() {
            Some(task) => Ok(task),
            None => Err(StoreError::Unavailable(format!(
                "create rejected: {}",
                failure_summary(&failures)
            ))),
        }
    }

    async fn create_many(&self, drafts: Vec<TaskDraft>) -> StoreResult<BatchOutcome<Task>> {
        let mut records = Vec::new();
        let mut failures = Vec::new();
        let mut first_invalid = None;
        for draft in &drafts {
            match validated_title(&draft.title) {
                Ok(title) => records.push(task_create_fields(draft, &title)),
                Err(err) => {
                    failures.push(RecordFailure {
                        message: err.to_string(),
                    });
                    first_invalid.get_or_insert(err);
                }
            }
        }
        if records.is_empty() {
            return match first_invalid {
                Some(err) => Err(err),
                None => Ok(BatchOutcome::default()),
            };
        }

        let results = self
            .send_write(
                self.client
                    .post(self.records_url(TASKS_TABLE))
                    .json(&WritePayload { records }),
            )
            .await?;
        let (succeeded, remote_failures) = split_task_results(results, Utc::now());
        failures.extend(remote_failures);

        if succeeded.is_empty() {
            return Err(StoreError::Unavailable(format!(
                "batch create rejected: {}",
                failure_summary(&failures)
            )));
        }
        for failure in &failures {
            tracing::warn!(message = %failure.message, "record failed in batch create");
        }
        Ok(BatchOutcome { succeeded, failures })
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        let existing = TaskStore::get_by_id(self, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("task {id}")))?;
        let merged = apply_task_patch(&existing, &patch, Utc::now())?;

        let payload = WritePayload {
            records: vec![task_patch_fields(id, &merged, &patch)],
        };
        let results = self
            .send_write(
                self.client
                    .patch(self.records_url(TASKS_TABLE))
                    .json(&payload),
            )
            .await?;
        let (mut succeeded, failures) = split_task_results(results, Utc::now());
        match succeeded.pop() {
            Some(task) => Ok(task),
            None => Err(StoreError::Unavailable(format!(
                "update rejected: {}",
                failure_summary(&failures)
            ))),
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let payload = DeletePayload {
            record_ids: vec![id.to_string()],
        };
        let results: Vec<RecordResult<TaskRecord>> = self
            .send_write(
                self.client
                    .delete(self.records_url(TASKS_TABLE))
                    .json(&payload),
            )
            .await?;
        if results.iter().any(|r| r.success) {
            Ok(true)
        } else {
            Err(StoreError::NotFound(format!("task {id}")))
        }
    }
}

#[async_trait]
impl CategoryStore for RemoteTableStore {
    async fn get_all(&self) -> StoreResult<Vec<Category>> {
        let records: Vec<CategoryRecord> = self.fetch_list(CATEGORIES_TABLE).await?;
        Ok(records
            .iter()
            .map(|r| category_from_record(r, crate::config::DEFAULT_CATEGORY_COLOR))
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Category>> {
        let record: Option<CategoryRecord> = self.fetch_record(CATEGORIES_TABLE, id).await?;
        Ok(record.map(|r| category_from_record(&r, crate::config::DEFAULT_CATEGORY_COLOR)))
    }

    async fn create(&self, draft: CategoryDraft) -> StoreResult<Category> {
        let name = validated_name(&draft.name)?;
        let payload = WritePayload {
            records: vec![category_create_fields(&draft, &name)],
        };
        let results: Vec<RecordResult<CategoryRecord>> = self
            .send_write(
                self.client
                    .post(self.records_url(CATEGORIES_TABLE))
                    .json(&payload),
            )
            .await?;
        let record = results
            .into_iter()
            .find_map(|r| if r.success { r.data } else { None })
            .ok_or_else(|| StoreError::Unavailable("category create rejected".into()))?;
        Ok(category_from_record(
            &record,
            crate::config::DEFAULT_CATEGORY_COLOR,
        ))
    }

    async fn update(&self, id: &str, patch: CategoryPatch) -> StoreResult<Category> {
        let existing = CategoryStore::get_by_id(self, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("category {id}")))?;
        let merged = apply_category_patch(&existing, &patch)?;

        let payload = WritePayload {
            records: vec![category_patch_fields(id, &merged, &patch)],
        };
        let results: Vec<RecordResult<CategoryRecord>> = self
            .send_write(
                self.client
                    .patch(self.records_url(CATEGORIES_TABLE))
                    .json(&payload),
            )
            .await?;
        match results.into_iter().find_map(|r| if r.success { r.data } else { None }) {
            Some(record) => Ok(category_from_record(
                &record,
                crate::config::DEFAULT_CATEGORY_COLOR,
            )),
            None => Err(StoreError::Unavailable("category update rejected".into())),
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let payload = DeletePayload {
            record_ids: vec![id.to_string()],
        };
        let results: Vec<RecordResult<CategoryRecord>> = self
            .send_write(
                self.client
                    .delete(self.records_url(CATEGORIES_TABLE))
                    .json(&payload),
            )
            .await?;
        if results.iter().any(|r| r.success) {
            Ok(true)
        } else {
            Err(StoreError::NotFound(format!("category {id}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    fn merged_task() -> Task {
        Task {
            id: "rec9".into(),
            title: "Refill prescription".into(),
            notes: "before Friday".into(),
            priority: Priority::High,
            category: "Health".into(),
            due_date: Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
            completed: true,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            completed_at: Some(Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap()),
        }
    }

    #[test]
    fn patch_payload_carries_only_touched_fields() {
        let merged = merged_task();
        let patch = TaskPatch {
            priority: Some(Priority::High),
            ..Default::default()
        };
        let value = task_patch_fields("rec9", &merged, &patch);
        let fields = value.as_object().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["Id"], json!("rec9"));
        assert_eq!(fields["priority"], json!("high"));
        assert!(!fields.contains_key("created_at"));
    }

    #[test]
    fn completion_toggle_carries_paired_stamp() {
        let merged = merged_task();
        let patch = TaskPatch {
            completed: Some(true),
            ..Default::default()
        };
        let value = task_patch_fields("rec9", &merged, &patch);
        let fields = value.as_object().unwrap();
        assert_eq!(fields["completed"], json!(true));
        assert_eq!(
            fields["completed_at"],
            json!("2024-05-20T09:00:00+00:00")
        );
    }

    #[test]
    fn clearing_due_date_sends_explicit_null() {
        let mut merged = merged_task();
        merged.due_date = None;
        let patch = TaskPatch {
            due_date: Some(None),
            ..Default::default()
        };
        let value = task_patch_fields("rec9", &merged, &patch);
        assert_eq!(value.as_object().unwrap()["due_date"], Value::Null);
    }

    #[test]
    fn create_payload_omits_server_assigned_fields() {
        let draft = TaskDraft {
            title: "New".into(),
            category: "Work".into(),
            ..Default::default()
        };
        let value = task_create_fields(&draft, "New");
        let fields = value.as_object().unwrap();
        assert!(!fields.contains_key("Id"));
        assert!(!fields.contains_key("CreatedOn"));
        assert!(!fields.contains_key("created_at"));
        assert_eq!(fields["completed"], json!(false));
    }

    #[test]
    fn split_results_separates_successes_from_failures() {
        let raw = r#"{
            "success": true,
            "results": [
                {"success": true, "data": {"Id": "a", "title": "kept"}},
                {"success": false, "message": "title too long"},
                {"success": true, "data": {"Id": "b", "title": "also kept"}}
            ]
        }"#;
        let envelope: WriteEnvelope<TaskRecord> = serde_json::from_str(raw).unwrap();
        let (succeeded, failures) = split_task_results(envelope.results, Utc::now());
        assert_eq!(succeeded.len(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message, "title too long");

        let outcome = BatchOutcome {
            succeeded,
            failures,
        };
        assert!(outcome.is_partial());
    }

    #[test]
    fn list_envelope_tolerates_missing_fields() {
        let envelope: ListEnvelope<TaskRecord> =
            serde_json::from_str(r#"{"success": true, "data": [{"title": "only title"}]}"#)
                .unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.data.len(), 1);
        assert!(envelope.message.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let store = RemoteTableStore::new("https://api.example.dev/").unwrap();
        assert_eq!(
            store.records_url(TASKS_TABLE),
            "https://api.example.dev/tables/task/records"
        );
        assert_eq!(
            store.record_url(CATEGORIES_TABLE, "c1"),
            "https://api.example.dev/tables/category/records/c1"
        );
    }
}
