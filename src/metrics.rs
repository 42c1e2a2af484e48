//! Summary numbers over the full, unfiltered task collection. Pure
//! functions; today/overdue reuse the view predicates so the counts can
//! never disagree with the filtered lists.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::Task;
use crate::view::{is_due_today, is_overdue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    /// Whole-percent completion, 0 for an empty collection.
    pub completion_rate: u32,
    pub due_today: usize,
    pub overdue: usize,
}

pub fn completion_rate(tasks: &[Task]) -> u32 {
    if tasks.is_empty() {
        return 0;
    }
    let completed = tasks.iter().filter(|t| t.completed).count();
    ((completed as f64 / tasks.len() as f64) * 100.0).round() as u32
}

pub fn due_today_count(tasks: &[Task], today: NaiveDate) -> usize {
    tasks.iter().filter(|t| is_due_today(t, today)).count()
}

pub fn overdue_count(tasks: &[Task], today: NaiveDate) -> usize {
    tasks.iter().filter(|t| is_overdue(t, today)).count()
}

pub fn compute_stats(tasks: &[Task], today: NaiveDate) -> TaskStats {
    TaskStats {
        total: tasks.len(),
        completed: tasks.iter().filter(|t| t.completed).count(),
        completion_rate: completion_rate(tasks),
        due_today: due_today_count(tasks, today),
        overdue: overdue_count(tasks, today),
    }
}

/// Actual per-category-name counts by scanning tasks. The advisory
/// `task_count` stored on Category records is ignored.
pub fn category_task_counts(tasks: &[Task]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for task in tasks {
        *counts.entry(task.category.clone()).or_insert(0) += 1;
    }
    counts
}

/// Fixed six-rung ladder keyed on completion rate. Presentational, but
/// deterministic for a given rate.
pub fn progress_message(rate: u32) -> &'static str {
    match rate {
        0 => "Ready to start your productive day!",
        1..=24 => "Let's make today productive! \u{2728}",
        25..=49 => "Nice start! Keep building momentum! \u{1F680}",
        50..=74 => "Great progress! You're doing well! \u{2B50}",
        75..=99 => "Almost there! Keep going! \u{1F4AA}",
        _ => "Amazing! All tasks completed! \u{1F389}",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::Utc;
    use rstest::rstest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn task(category: &str, completed: bool, due: Option<NaiveDate>) -> Task {
        Task {
            id: ulid::Ulid::new().to_string(),
            title: "t".into(),
            notes: String::new(),
            priority: Priority::Medium,
            category: category.to_string(),
            due_date: due,
            completed,
            created_at: Utc::now(),
            completed_at: completed.then(Utc::now),
        }
    }

    #[test]
    fn empty_collection_yields_zero_rate() {
        assert_eq!(completion_rate(&[]), 0);
        let stats = compute_stats(&[], today());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion_rate, 0);
    }

    #[test]
    fn rate_rounds_to_nearest_percent() {
        let tasks = vec![
            task("Work", true, None),
            task("Work", false, None),
            task("Work", false, None),
        ];
        // 1/3 rounds to 33
        assert_eq!(completion_rate(&tasks), 33);
    }

    #[test]
    fn counts_match_view_predicates() {
        let yesterday = today() - chrono::Duration::days(1);
        let tasks = vec![
            task("Work", false, Some(today())),
            task("Work", false, Some(yesterday)),
            task("Work", true, Some(yesterday)),
        ];
        let stats = compute_stats(&tasks, today());
        assert_eq!(stats.due_today, 1);
        assert_eq!(stats.overdue, 1);
    }

    #[test]
    fn category_counts_scan_tasks() {
        let tasks = vec![
            task("Work", false, None),
            task("Work", true, None),
            task("Home", false, None),
        ];
        let counts = category_task_counts(&tasks);
        assert_eq!(counts.get("Work"), Some(&2));
        assert_eq!(counts.get("Home"), Some(&1));
        assert_eq!(counts.get("Errands"), None);
    }

    #[rstest]
    #[case(0, "Ready to start your productive day!")]
    #[case(1, "Let's make today productive! \u{2728}")]
    #[case(24, "Let's make today productive! \u{2728}")]
    #[case(25, "Nice start! Keep building momentum! \u{1F680}")]
    #[case(30, "Nice start! Keep building momentum! \u{1F680}")]
    #[case(49, "Nice start! Keep building momentum! \u{1F680}")]
    #[case(50, "Great progress! You're doing well! \u{2B50}")]
    #[case(74, "Great progress! You're doing well! \u{2B50}")]
    #[case(75, "Almost there! Keep going! \u{1F4AA}")]
    #[case(99, "Almost there! Keep going! \u{1F4AA}")]
    #[case(100, "Amazing! All tasks completed! \u{1F389}")]
    fn message_ladder_is_total_and_deterministic(#[case] rate: u32, #[case] expected: &str) {
        assert_eq!(progress_message(rate), expected);
    }
}
