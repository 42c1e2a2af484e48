use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::config::{AppConfig, BackendKind};
use crate::metrics;
use crate::model::{
    CategoryDraft, CategorySelector, Priority, Task, TaskDraft, TaskPatch,
};
use crate::normalize::{task_from_record, TaskRecord};
use crate::service::TaskflowService;

#[derive(Debug, Parser)]
#[command(
    name = "taskflow",
    version,
    about = "Personal task list over interchangeable local/remote backends"
)]
pub struct Cli {
    /// Override the data directory used by the local backend.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Which persistence backend to drive.
    #[arg(long, global = true, value_enum, default_value_t = BackendKind::Local)]
    pub backend: BackendKind,

    /// Base URL of the remote table API (or TASKFLOW_REMOTE_URL).
    #[arg(long, global = true)]
    pub remote_url: Option<String>,

    /// Tracing filter, e.g. "debug" or "taskflow=debug".
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show the projected task list for a selector and optional search.
    List {
        /// `all`, `today`, `overdue`, or a category name.
        #[arg(long, default_value = "all")]
        category: String,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Create a task.
    Add {
        /// Task title (words are joined).
        #[arg(required = true)]
        title: Vec<String>,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(long, default_value = "")]
        category: String,
        /// Due date as YYYY-MM-DD.
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    /// Mark a task completed.
    Done { id: String },
    /// Mark a completed task as open again.
    Reopen { id: String },
    /// Update fields of an existing task.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        /// Remove the due date.
        #[arg(long)]
        clear_due: bool,
    },
    /// Show a single task by id.
    Show { id: String },
    /// Delete a task.
    Delete { id: String },
    /// Batch-create tasks from a JSON file of records.
    Import { file: PathBuf },
    /// List categories with live task counts.
    Categories,
    /// Create a category.
    AddCategory {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
}

pub async fn execute(cli: Cli, out: &mut impl Write) -> Result<()> {
    let config = AppConfig::discover(cli.data_dir.clone(), cli.backend, cli.remote_url.clone())?;
    let service = TaskflowService::from_config(&config)
        .await
        .context("failed to open persistence backend")?;

    let command = cli.command.unwrap_or(Command::List {
        category: "all".into(),
        search: String::new(),
    });

    match command {
        Command::List { category, search } => {
            let selector: CategorySelector = category.parse().unwrap_or_default();
            let snapshot = service.snapshot(&selector, &search).await?;
            writeln!(
                out,
                "{} — {}% done, {} due today, {} overdue",
                metrics::progress_message(snapshot.stats.completion_rate),
                snapshot.stats.completion_rate,
                snapshot.stats.due_today,
                snapshot.stats.overdue
            )?;
            for task in &snapshot.tasks {
                writeln!(out, "{}", render_task(task))?;
            }
        }
        Command::Add {
            title,
            notes,
            priority,
            category,
            due,
        } => {
            let created = service
                .create_task(TaskDraft {
                    title: title.join(" "),
                    notes,
                    priority,
                    category,
                    due_date: due,
                    ..Default::default()
                })
                .await?;
            writeln!(out, "Added {} {}", created.id, created.title)?;
        }
        Command::Done { id } => {
            let task = service
                .update_task(
                    &id,
                    TaskPatch {
                        completed: Some(true),
                        ..Default::default()
                    },
                )
                .await?;
            writeln!(out, "Completed {} {}", task.id, task.title)?;
        }
        Command::Reopen { id } => {
            let task = service
                .update_task(
                    &id,
                    TaskPatch {
                        completed: Some(false),
                        ..Default::default()
                    },
                )
                .await?;
            writeln!(out, "Reopened {} {}", task.id, task.title)?;
        }
        Command::Edit {
            id,
            title,
            notes,
            priority,
            category,
            due,
            clear_due,
        } => {
            let due_date = if clear_due {
                Some(None)
            } else {
                due.map(Some)
            };
            let patch = TaskPatch {
                title,
                notes,
                priority,
                category,
                due_date,
                completed: None,
            };
            anyhow::ensure!(!patch.is_empty(), "nothing to update: no field flags given");
            let task = service.update_task(&id, patch).await?;
            writeln!(out, "Updated {} {}", task.id, task.title)?;
        }
        Command::Show { id } => {
            match service.fetch_task(&id).await? {
                Some(task) => {
                    writeln!(out, "{}", render_task(&task))?;
                    if !task.notes.is_empty() {
                        writeln!(out, "    {}", task.notes)?;
                    }
                }
                None => writeln!(out, "No task with id {id}")?,
            }
        }
        Command::Delete { id } => {
            service.delete_task(&id).await?;
            writeln!(out, "Deleted {id}")?;
        }
        Command::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let records: Vec<TaskRecord> =
                serde_json::from_str(&raw).context("import file is not a record array")?;
            let now = Utc::now();
            let drafts = records
                .iter()
                .map(|record| {
                    let task = task_from_record(record, now);
                    TaskDraft {
                        title: task.title,
                        notes: task.notes,
                        priority: task.priority,
                        category: task.category,
                        due_date: task.due_date,
                        completed: task.completed,
                        created_at: Some(task.created_at),
                    }
                })
                .collect();
            let outcome = service.import_tasks(drafts).await?;
            writeln!(
                out,
                "Imported {} task(s), {} failed",
                outcome.succeeded.len(),
                outcome.failures.len()
            )?;
            for failure in &outcome.failures {
                writeln!(out, "  skipped: {}", failure.message)?;
            }
        }
        Command::Categories => {
            let snapshot = service.snapshot(&CategorySelector::All, "").await?;
            let counts = metrics::category_task_counts(&snapshot.tasks);
            for category in &snapshot.categories {
                let count = counts.get(&category.name).copied().unwrap_or(0);
                writeln!(out, "{} {} ({count})", category.color, category.name)?;
            }
        }
        Command::AddCategory { name, color } => {
            let category = service
                .create_category(CategoryDraft { name, color })
                .await?;
            writeln!(out, "Added category {} {}", category.id, category.name)?;
        }
    }

    Ok(())
}

fn render_task(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let mut line = format!("[{mark}] {} ({}) {}", task.id, task.priority, task.title);
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due:{due}"));
    }
    if !task.category.is_empty() {
        line.push_str(&format!(" #{}", task.category));
    }
    line
}
