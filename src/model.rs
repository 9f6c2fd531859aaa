use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type TaskId = String;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: NaiveDate,
    pub urgency: Urgency,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

/// Fields a user supplies when creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub urgency: Urgency,
    pub tags: Vec<String>,
}

/// Partial update for an existing task. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub urgency: Option<Urgency>,
    pub tags: Option<Vec<String>>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("title must not be empty")]
    EmptyTitle,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown urgency {0:?} (expected low, medium, high or critical)")]
pub struct ParseUrgencyError(String);

impl Task {
    pub fn new(id: TaskId, input: TaskInput, created_at: DateTime<Utc>) -> Self {
        Task {
            id,
            title: input.title,
            description: input.description,
            due_date: input.due_date,
            urgency: input.urgency,
            tags: input.tags,
            completed: false,
            created_at,
        }
    }

    /// Incomplete and due strictly before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date < today
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(due) = patch.due_date {
            self.due_date = due;
        }
        if let Some(urgency) = patch.urgency {
            self.urgency = urgency;
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
    }
}

impl TaskInput {
    pub fn validate(&self) -> Result<(), Rejection> {
        validate_title(&self.title)
    }
}

impl TaskPatch {
    pub fn validate(&self) -> Result<(), Rejection> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }
}

impl From<TaskInput> for TaskPatch {
    fn from(input: TaskInput) -> Self {
        TaskPatch {
            title: Some(input.title),
            description: Some(input.description),
            due_date: Some(input.due_date),
            urgency: Some(input.urgency),
            tags: Some(input.tags),
        }
    }
}

fn validate_title(title: &str) -> Result<(), Rejection> {
    if title.trim().is_empty() {
        return Err(Rejection::EmptyTitle);
    }
    Ok(())
}

impl Urgency {
    pub const ALL: [Urgency; 4] = [
        Urgency::Low,
        Urgency::Medium,
        Urgency::High,
        Urgency::Critical,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Low => "Low",
            Urgency::Medium => "Medium",
            Urgency::High => "High",
            Urgency::Critical => "Critical",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Urgency::Low => Urgency::Medium,
            Urgency::Medium => Urgency::High,
            Urgency::High => Urgency::Critical,
            Urgency::Critical => Urgency::Low,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Urgency::Low => Urgency::Critical,
            Urgency::Medium => Urgency::Low,
            Urgency::High => Urgency::Medium,
            Urgency::Critical => Urgency::High,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Urgency {
    type Err = ParseUrgencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Urgency::ALL
            .into_iter()
            .find(|u| u.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseUrgencyError(s.to_string()))
    }
}

/// Drops blank and repeated labels, keeping first occurrence order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Task {
        Task::new(
            "abc".into(),
            TaskInput {
                title: "Write report".into(),
                description: "quarterly".into(),
                due_date: date(2024, 1, 10),
                urgency: Urgency::High,
                tags: vec!["Work".into()],
            },
            Utc.timestamp_millis_opt(1_704_067_200_000).unwrap(),
        )
    }

    #[test]
    fn new_task_starts_incomplete() {
        let task = sample();
        assert!(!task.completed);
        assert_eq!(task.created_at.timestamp_millis(), 1_704_067_200_000);
    }

    #[test]
    fn serializes_with_persisted_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["dueDate"], "2024-01-10");
        assert_eq!(json["urgency"], "High");
        assert_eq!(json["createdAt"], 1_704_067_200_000_i64);
        assert_eq!(json["completed"], false);
        assert_eq!(json["tags"][0], "Work");
    }

    #[test]
    fn deserializes_stored_record() {
        let raw = r#"{"id":"x1","title":"Buy milk","description":"","dueDate":"2024-02-29",
            "urgency":"Critical","tags":["Shopping"],"completed":true,"createdAt":1700000000000}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.due_date, date(2024, 2, 29));
        assert_eq!(task.urgency, Urgency::Critical);
        assert!(task.completed);
    }

    #[test]
    fn overdue_only_before_today_and_incomplete() {
        let mut task = sample();
        assert!(task.is_overdue(date(2024, 1, 11)));
        assert!(!task.is_overdue(date(2024, 1, 10)));
        task.completed = true;
        assert!(!task.is_overdue(date(2024, 1, 11)));
    }

    #[test]
    fn patch_touches_only_given_fields() {
        let mut task = sample();
        let before = task.clone();
        task.apply(&TaskPatch {
            urgency: Some(Urgency::Low),
            ..TaskPatch::default()
        });
        assert_eq!(task.urgency, Urgency::Low);
        assert_eq!(task.title, before.title);
        assert_eq!(task.tags, before.tags);
        assert_eq!(task.id, before.id);
        assert_eq!(task.created_at, before.created_at);
    }

    #[test]
    fn blank_titles_are_rejected() {
        let mut input = TaskInput {
            title: "   ".into(),
            description: String::new(),
            due_date: date(2024, 1, 1),
            urgency: Urgency::Low,
            tags: Vec::new(),
        };
        assert_eq!(input.validate(), Err(Rejection::EmptyTitle));
        input.title = "ok".into();
        assert_eq!(input.validate(), Ok(()));
        let patch = TaskPatch {
            title: Some("\t".into()),
            ..TaskPatch::default()
        };
        assert_eq!(patch.validate(), Err(Rejection::EmptyTitle));
        assert_eq!(TaskPatch::default().validate(), Ok(()));
    }

    #[test]
    fn urgency_parses_case_insensitively() {
        assert_eq!("critical".parse::<Urgency>().unwrap(), Urgency::Critical);
        assert_eq!(" Medium ".parse::<Urgency>().unwrap(), Urgency::Medium);
        assert!("urgent".parse::<Urgency>().is_err());
        assert_eq!(Urgency::Critical.next(), Urgency::Low);
        assert_eq!(Urgency::Low.prev(), Urgency::Critical);
    }

    #[test]
    fn normalize_tags_dedupes_in_order() {
        let tags = normalize_tags(["Work", " Ideas", "", "Work", "Health"]);
        assert_eq!(tags, vec!["Work", "Ideas", "Health"]);
    }
}
