//! View projection: deterministic filtering and ordering of the task
//! collection for display. Everything here is a pure function of its
//! arguments — `today` is passed in rather than read from a clock, so the
//! same inputs always produce the same ordered output.

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::model::{CategorySelector, Task};

/// Day-granularity due predicates. The metrics layer uses the same two
/// functions, keeping sidebar counts and filtered results in lockstep.
pub fn is_due_today(task: &Task, today: NaiveDate) -> bool {
    task.due_date == Some(today)
}

pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    matches!(task.due_date, Some(due) if due < today) && !task.completed
}

fn matches_selector(task: &Task, selector: &CategorySelector, today: NaiveDate) -> bool {
    match selector {
        CategorySelector::All => true,
        CategorySelector::Today => is_due_today(task, today),
        CategorySelector::Overdue => is_overdue(task, today),
        CategorySelector::Named(name) => task.category == *name,
    }
}

fn matches_query(task: &Task, needle_lower: &str) -> bool {
    task.title.to_lowercase().contains(needle_lower)
        || task.notes.to_lowercase().contains(needle_lower)
}

/// Total order over tasks: incomplete before completed, then priority
/// descending, then due date ascending (any due date before none), then
/// creation time descending as the final tiebreak.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| b.priority.rank().cmp(&a.priority.rank()))
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Filter by selector and free-text query, then sort. The query is applied
/// only when non-empty: case-insensitive substring over title or notes.
pub fn project(
    tasks: &[Task],
    selector: &CategorySelector,
    query: &str,
    today: NaiveDate,
) -> Vec<Task> {
    let needle = query.trim().to_lowercase();
    let mut selected: Vec<Task> = tasks
        .iter()
        .filter(|task| matches_selector(task, selector, today))
        .filter(|task| needle.is_empty() || matches_query(task, &needle))
        .cloned()
        .collect();
    selected.sort_by(compare_tasks);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn created(offset_hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(offset_hours)
    }

    fn task(title: &str, priority: Priority, completed: bool, due: Option<NaiveDate>) -> Task {
        Task {
            id: title.to_string(),
            title: title.to_string(),
            notes: String::new(),
            priority,
            category: "Work".into(),
            due_date: due,
            completed,
            created_at: created(0),
            completed_at: completed.then(|| created(1)),
        }
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn all_selector_with_empty_query_keeps_everything() {
        let tasks = vec![
            task("A", Priority::Low, false, None),
            task("B", Priority::High, true, None),
        ];
        let projected = project(&tasks, &CategorySelector::All, "", today());
        assert_eq!(projected.len(), tasks.len());
        for original in &tasks {
            assert!(projected.iter().any(|t| t.id == original.id));
        }
    }

    #[test]
    fn incomplete_then_priority_then_completed_last() {
        let tasks = vec![
            task("A", Priority::Low, false, None),
            task("B", Priority::High, false, None),
            task("C", Priority::High, true, None),
        ];
        let projected = project(&tasks, &CategorySelector::All, "", today());
        assert_eq!(titles(&projected), vec!["B", "A", "C"]);
    }

    #[test]
    fn due_dates_sort_ascending_ahead_of_dateless() {
        let near = today() + chrono::Duration::days(1);
        let far = today() + chrono::Duration::days(7);
        let tasks = vec![
            task("none", Priority::Medium, false, None),
            task("far", Priority::Medium, false, Some(far)),
            task("near", Priority::Medium, false, Some(near)),
        ];
        let projected = project(&tasks, &CategorySelector::All, "", today());
        assert_eq!(titles(&projected), vec!["near", "far", "none"]);
    }

    #[test]
    fn dateless_ties_break_on_creation_time_descending() {
        let mut older = task("older", Priority::Medium, false, None);
        older.created_at = created(0);
        let mut newer = task("newer", Priority::Medium, false, None);
        newer.created_at = created(5);
        let projected = project(&[older, newer], &CategorySelector::All, "", today());
        assert_eq!(titles(&projected), vec!["newer", "older"]);
    }

    #[test]
    fn sorting_is_idempotent() {
        let tasks = vec![
            task("A", Priority::Low, false, Some(today())),
            task("B", Priority::High, true, None),
            task("C", Priority::Medium, false, None),
            task("D", Priority::High, false, Some(today() + chrono::Duration::days(2))),
        ];
        let once = project(&tasks, &CategorySelector::All, "", today());
        let twice = project(&once, &CategorySelector::All, "", today());
        assert_eq!(once, twice);
    }

    #[test]
    fn today_selector_keeps_only_tasks_due_today() {
        let tasks = vec![
            task("due-today", Priority::Medium, false, Some(today())),
            task("due-later", Priority::Medium, false, Some(today() + chrono::Duration::days(1))),
            task("dateless", Priority::Medium, false, None),
        ];
        let projected = project(&tasks, &CategorySelector::Today, "", today());
        assert_eq!(titles(&projected), vec!["due-today"]);
    }

    #[test]
    fn overdue_excludes_completed_and_today() {
        let yesterday = today() - chrono::Duration::days(1);
        let tasks = vec![
            task("late", Priority::Medium, false, Some(yesterday)),
            task("late-done", Priority::Medium, true, Some(yesterday)),
            task("due-today", Priority::Medium, false, Some(today())),
        ];
        let projected = project(&tasks, &CategorySelector::Overdue, "", today());
        assert_eq!(titles(&projected), vec!["late"]);
    }

    #[test]
    fn named_selector_matches_category_case_sensitively() {
        let mut work = task("work", Priority::Medium, false, None);
        work.category = "Work".into();
        let mut lower = task("lower", Priority::Medium, false, None);
        lower.category = "work".into();
        let projected = project(
            &[work, lower],
            &CategorySelector::Named("Work".into()),
            "",
            today(),
        );
        assert_eq!(titles(&projected), vec!["work"]);
    }

    #[test]
    fn query_matches_title_or_notes_case_insensitively() {
        let mut by_title = task("Buy groceries", Priority::Medium, false, None);
        by_title.notes = String::new();
        let mut by_notes = task("Weekly errand", Priority::Medium, false, None);
        by_notes.notes = "pick up GROCERIES on the way home".into();
        let miss = task("Call dentist", Priority::Medium, false, None);

        let projected = project(
            &[by_title, by_notes, miss],
            &CategorySelector::All,
            "groceries",
            today(),
        );
        assert_eq!(projected.len(), 2);
    }
}
