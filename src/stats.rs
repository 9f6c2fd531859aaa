use crate::model::Task;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub overdue: usize,
}

/// Counts tasks against the local calendar day `today`. A task is overdue when
/// it is incomplete and its due date falls before midnight of `today`.
pub fn compute(tasks: &[Task], today: NaiveDate) -> Stats {
    tasks.iter().fold(Stats::default(), |mut stats, task| {
        stats.total += 1;
        if task.completed {
            stats.completed += 1;
        } else {
            stats.active += 1;
        }
        if task.is_overdue(today) {
            stats.overdue += 1;
        }
        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskInput, Urgency};
    use chrono::{TimeZone, Utc};

    fn task(due: NaiveDate, completed: bool) -> Task {
        let mut t = Task::new(
            "t".into(),
            TaskInput {
                title: "t".into(),
                description: String::new(),
                due_date: due,
                urgency: Urgency::Medium,
                tags: Vec::new(),
            },
            Utc.timestamp_millis_opt(0).unwrap(),
        );
        t.completed = completed;
        t
    }

    #[test]
    fn empty_collection_is_all_zero() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(compute(&[], today), Stats::default());
    }

    #[test]
    fn counts_yesterday_only_while_incomplete() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let yesterday = today.pred_opt().unwrap();
        let tasks = vec![
            task(yesterday, false),
            task(yesterday, true),
            task(today, false),
            task(today.succ_opt().unwrap(), false),
        ];
        let stats = compute(&tasks, today);
        assert_eq!(
            stats,
            Stats {
                total: 4,
                active: 3,
                completed: 1,
                overdue: 1,
            }
        );
    }

    #[test]
    fn overdue_moves_with_the_reference_day() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let tasks = vec![task(due, false)];
        assert_eq!(compute(&tasks, due).overdue, 0);
        assert_eq!(compute(&tasks, due.succ_opt().unwrap()).overdue, 1);
    }
}
