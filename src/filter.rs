use crate::model::{Task, Urgency};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

/// The search/status/urgency/tag selection that decides which tasks are visible.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterConfig {
    pub search: String,
    pub status: StatusFilter,
    /// `None` matches every urgency.
    pub urgency: Option<Urgency>,
    /// `None` matches every tag.
    pub tag: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown status {0:?} (expected all, active or completed)")]
pub struct ParseStatusError(String);

impl StatusFilter {
    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Completed => "completed",
        }
    }

    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Active,
            StatusFilter::Active => StatusFilter::Completed,
            StatusFilter::Completed => StatusFilter::All,
        }
    }

    fn matches(&self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StatusFilter {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" | "done" => Ok(StatusFilter::Completed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

impl FilterConfig {
    /// Conjunction of the search, status, urgency and tag clauses. `needle`
    /// is the already lowercased search text.
    fn matches_lowered(&self, needle: &str, task: &Task) -> bool {
        let search = needle.is_empty()
            || task.title.to_lowercase().contains(needle)
            || task.description.to_lowercase().contains(needle);
        search
            && self.status.matches(task)
            && self.urgency.map_or(true, |u| task.urgency == u)
            && self.tag.as_deref().map_or(true, |tag| task.has_tag(tag))
    }

    pub fn is_default(&self) -> bool {
        self == &FilterConfig::default()
    }
}

/// Filters `tasks` and orders the result: incomplete first, then by due date.
/// The sort is stable, so exact ties keep collection order.
pub fn view<'a>(tasks: &'a [Task], filter: &FilterConfig) -> Vec<&'a Task> {
    let needle = filter.search.to_lowercase();
    let mut out: Vec<&Task> = tasks
        .iter()
        .filter(|task| filter.matches_lowered(&needle, task))
        .collect();
    out.sort_by(|a, b| {
        a.completed
            .cmp(&b.completed)
            .then_with(|| a.due_date.cmp(&b.due_date))
    });
    out
}

/// Holds the live filter selection for an interactive session.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    config: FilterConfig,
}

impl FilterState {
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.config.search = search.into();
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        self.config.status = status;
    }

    pub fn set_urgency(&mut self, urgency: Option<Urgency>) {
        self.config.urgency = urgency;
    }

    pub fn set_tag(&mut self, tag: Option<String>) {
        self.config.tag = tag;
    }

    pub fn cycle_status(&mut self) {
        self.config.status = self.config.status.next();
    }

    /// All -> Low -> Medium -> High -> Critical -> All.
    pub fn cycle_urgency(&mut self) {
        self.config.urgency = match self.config.urgency {
            None => Some(Urgency::Low),
            Some(Urgency::Critical) => None,
            Some(u) => Some(u.next()),
        };
    }

    /// Steps through `known` tags, wrapping back to "all" after the last one.
    pub fn cycle_tag(&mut self, known: &[String]) {
        let next = match &self.config.tag {
            None => known.first().cloned(),
            Some(current) => known
                .iter()
                .position(|t| t == current)
                .and_then(|idx| known.get(idx + 1))
                .cloned(),
        };
        self.config.tag = next;
    }

    pub fn reset(&mut self) {
        self.config = FilterConfig::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskInput;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn task(id: &str, due: (i32, u32, u32), completed: bool, urgency: Urgency) -> Task {
        let mut t = Task::new(
            id.into(),
            TaskInput {
                title: format!("Task {}", id),
                description: String::new(),
                due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap(),
                urgency,
                tags: Vec::new(),
            },
            Utc.timestamp_millis_opt(0).unwrap(),
        );
        t.completed = completed;
        t
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.clone()).collect()
    }

    fn scenario() -> Vec<Task> {
        vec![
            task("A", (2024, 1, 1), false, Urgency::Low),
            task("B", (2024, 1, 3), true, Urgency::High),
            task("C", (2024, 1, 2), false, Urgency::Critical),
        ]
    }

    #[test]
    fn all_status_sorts_incomplete_first_then_by_date() {
        let tasks = scenario();
        let out = view(&tasks, &FilterConfig::default());
        assert_eq!(ids(&out), vec!["A", "C", "B"]);
    }

    #[test]
    fn active_status_hides_completed() {
        let tasks = scenario();
        let filter = FilterConfig {
            status: StatusFilter::Active,
            ..FilterConfig::default()
        };
        assert_eq!(ids(&view(&tasks, &filter)), vec!["A", "C"]);
        let filter = FilterConfig {
            status: StatusFilter::Completed,
            ..FilterConfig::default()
        };
        assert_eq!(ids(&view(&tasks, &filter)), vec!["B"]);
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let mut tasks = scenario();
        tasks[0].title = "Pay RENT".into();
        tasks[2].description = "call the landlord about rent".into();
        let filter = FilterConfig {
            search: "Rent".into(),
            ..FilterConfig::default()
        };
        assert_eq!(ids(&view(&tasks, &filter)), vec!["A", "C"]);
    }

    #[test]
    fn urgency_and_tag_require_exact_match() {
        let mut tasks = scenario();
        tasks[1].tags = vec!["Work".into()];
        tasks[2].tags = vec!["Workout".into()];
        let filter = FilterConfig {
            tag: Some("Work".into()),
            ..FilterConfig::default()
        };
        assert_eq!(ids(&view(&tasks, &filter)), vec!["B"]);
        let filter = FilterConfig {
            urgency: Some(Urgency::Critical),
            ..FilterConfig::default()
        };
        assert_eq!(ids(&view(&tasks, &filter)), vec!["C"]);
    }

    #[test]
    fn inclusion_is_conjunction_of_clauses() {
        let mut tasks = scenario();
        for t in tasks.iter_mut() {
            t.tags = vec!["Work".into()];
        }
        let filters = [
            FilterConfig {
                search: "task".into(),
                status: StatusFilter::Active,
                urgency: Some(Urgency::Low),
                tag: Some("Work".into()),
            },
            FilterConfig {
                search: "c".into(),
                status: StatusFilter::Completed,
                urgency: None,
                tag: Some("Work".into()),
            },
            FilterConfig {
                search: String::new(),
                status: StatusFilter::All,
                urgency: Some(Urgency::High),
                tag: Some("Home".into()),
            },
        ];
        for filter in &filters {
            let shown = view(&tasks, filter);
            for t in &tasks {
                let expected = filter.matches_lowered(&filter.search.to_lowercase(), t);
                assert_eq!(shown.iter().any(|s| s.id == t.id), expected, "{:?}", filter);
            }
        }
    }

    #[test]
    fn ties_keep_collection_order_and_dates_never_decrease() {
        let tasks = vec![
            task("x", (2024, 5, 1), true, Urgency::Low),
            task("y", (2024, 3, 1), false, Urgency::Low),
            task("z", (2024, 3, 1), false, Urgency::Low),
            task("w", (2024, 1, 1), true, Urgency::Low),
            task("v", (2024, 2, 1), false, Urgency::Low),
        ];
        let out = view(&tasks, &FilterConfig::default());
        assert_eq!(ids(&out), vec!["v", "y", "z", "w", "x"]);
        let first_done = out.iter().position(|t| t.completed).unwrap();
        assert!(out[first_done..].iter().all(|t| t.completed));
        for group in [&out[..first_done], &out[first_done..]] {
            assert!(group.windows(2).all(|w| w[0].due_date <= w[1].due_date));
        }
    }

    #[test]
    fn filter_state_cycles_wrap_to_all() {
        let known = vec!["Work".to_string(), "Home".to_string()];
        let mut state = FilterState::default();
        state.cycle_tag(&known);
        assert_eq!(state.config().tag.as_deref(), Some("Work"));
        state.cycle_tag(&known);
        assert_eq!(state.config().tag.as_deref(), Some("Home"));
        state.cycle_tag(&known);
        assert_eq!(state.config().tag, None);

        for _ in 0..4 {
            state.cycle_urgency();
        }
        assert_eq!(state.config().urgency, Some(Urgency::Critical));
        state.cycle_urgency();
        assert_eq!(state.config().urgency, None);

        state.cycle_status();
        state.set_search("milk");
        assert!(!state.config().is_default());
        state.reset();
        assert!(state.config().is_default());
    }

    #[test]
    fn status_parses_from_cli_labels() {
        assert_eq!("Active".parse::<StatusFilter>().unwrap(), StatusFilter::Active);
        assert_eq!("done".parse::<StatusFilter>().unwrap(), StatusFilter::Completed);
        assert!("pending".parse::<StatusFilter>().is_err());
    }
}
