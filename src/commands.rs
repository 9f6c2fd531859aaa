use crate::config::Config;
use crate::filter::{FilterState, StatusFilter};
use crate::model::{normalize_tags, Task, TaskInput, TaskPatch, Urgency};
use crate::service::{Outcome, TaskService};
use crate::services::{Clock, PromptGate};
use crate::stats::Stats;
use crate::storage::{FileStore, TaskStore};
use crate::{logging, ui};
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use tracing::warn;

type Service = TaskService<FileStore>;

pub fn list(
    config: &Config,
    search: String,
    status: StatusFilter,
    urgency: Option<Urgency>,
    tag: Option<String>,
) -> Result<()> {
    let service = open(config)?;
    let mut filter = FilterState::default();
    filter.set_search(search);
    filter.set_status(status);
    filter.set_urgency(urgency);
    filter.set_tag(tag);

    let today = service.clock().today();
    let shown = service.view(filter.config());
    println!("Tasks ({})", shown.len());
    if shown.is_empty() {
        println!("  No tasks found");
    }
    for task in &shown {
        print_task(task, today);
    }
    println!();
    print_stats(&service.stats());
    Ok(())
}

pub fn add(
    config: &Config,
    title: String,
    description: String,
    due: Option<String>,
    urgency: Option<Urgency>,
    tags: Vec<String>,
) -> Result<()> {
    let mut service = open(config)?;
    let due_date = match due.as_deref() {
        Some(raw) => parse_due(raw)?,
        None => service.clock().today(),
    };
    let input = TaskInput {
        title,
        description,
        due_date,
        urgency: urgency.unwrap_or(config.default_urgency),
        tags: checked_tags(config, tags),
    };
    let outcome = service.add(input).context("saving new task")?;
    report(&outcome, "");
    Ok(())
}

pub fn edit(
    config: &Config,
    task_id: String,
    title: Option<String>,
    description: Option<String>,
    due: Option<String>,
    urgency: Option<Urgency>,
    tags: Vec<String>,
    clear_tags: bool,
) -> Result<()> {
    let mut service = open(config)?;
    let patch = TaskPatch {
        title,
        description,
        due_date: due.as_deref().map(parse_due).transpose()?,
        urgency,
        tags: if clear_tags {
            Some(Vec::new())
        } else if tags.is_empty() {
            None
        } else {
            Some(checked_tags(config, tags))
        },
    };
    if patch.is_empty() {
        println!("Nothing to change for {}", task_id);
        return Ok(());
    }
    let outcome = service
        .edit(&task_id, &patch)
        .with_context(|| format!("saving task {}", task_id))?;
    report(&outcome, &task_id);
    Ok(())
}

pub fn toggle(config: &Config, task_id: String) -> Result<()> {
    let mut service = open(config)?;
    let outcome = service
        .toggle(&task_id)
        .with_context(|| format!("saving task {}", task_id))?;
    report(&outcome, &task_id);
    Ok(())
}

pub fn delete(config: &Config, task_id: String, yes: bool) -> Result<()> {
    let mut service = open(config)?;
    let mut gate = PromptGate { assume_yes: yes };
    let outcome = service
        .delete(&task_id, &mut gate)
        .with_context(|| format!("deleting task {}", task_id))?;
    report(&outcome, &task_id);
    Ok(())
}

pub fn clear_completed(config: &Config, yes: bool) -> Result<()> {
    let mut service = open(config)?;
    let mut gate = PromptGate { assume_yes: yes };
    let outcome = service
        .clear_completed(&mut gate)
        .context("clearing completed tasks")?;
    report(&outcome, "");
    Ok(())
}

pub fn stats(config: &Config) -> Result<()> {
    let service = open(config)?;
    print_stats(&service.stats());
    Ok(())
}

pub fn tags(config: &Config) -> Result<()> {
    let service = open(config)?;
    let tasks = service.tasks();
    for tag in &config.tags {
        let count = tasks.iter().filter(|t| t.has_tag(tag)).count();
        println!("{:<12} {}", tag, count);
    }
    let mut unknown: Vec<&str> = tasks
        .iter()
        .flat_map(|t| t.tags.iter())
        .filter(|t| !config.is_known_tag(t))
        .map(String::as_str)
        .collect();
    unknown.sort_unstable();
    unknown.dedup();
    if !unknown.is_empty() {
        println!("(also in use: {})", unknown.join(", "));
    }
    Ok(())
}

pub fn tui(config: &Config) -> Result<()> {
    let data_dir = config.data_dir()?;
    logging::init_file(&data_dir)?;
    let service = open(config)?;
    ui::run(service, config.clone())
}

fn open(config: &Config) -> Result<Service> {
    let dir = config.data_dir()?;
    let store = TaskStore::load(FileStore::new(dir), config.storage_key.clone());
    Ok(TaskService::with_system(store))
}

fn checked_tags(config: &Config, tags: Vec<String>) -> Vec<String> {
    let tags = normalize_tags(tags);
    for tag in tags.iter().filter(|t| !config.is_known_tag(t)) {
        warn!(%tag, "tag is not in the configured tag list");
    }
    tags
}

pub fn parse_due(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date format (use YYYY-MM-DD): {}", trimmed))
}

pub fn format_due(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

fn report(outcome: &Outcome, task_id: &str) {
    match outcome {
        Outcome::Created(id) => println!("Added task {}", id),
        Outcome::Updated => println!("Updated task {}", task_id),
        Outcome::Toggled { completed: true } => println!("Completed task {}", task_id),
        Outcome::Toggled { completed: false } => println!("Reopened task {}", task_id),
        Outcome::Removed(0) => println!("No completed tasks to remove"),
        Outcome::Removed(1) if !task_id.is_empty() => println!("Deleted task {}", task_id),
        Outcome::Removed(n) => println!("Removed {} task(s)", n),
        Outcome::NotFound => println!("No task with id {}", task_id),
        Outcome::Declined => println!("Canceled"),
        Outcome::Rejected(reason) => println!("Not saved: {}", reason),
    }
}

fn print_task(task: &Task, today: NaiveDate) {
    let check = if task.completed { "x" } else { " " };
    println!("  [{}] {}: {}", check, task.id, task.title);
    if !task.description.is_empty() {
        println!("      {}", task.description);
    }
    let overdue = if task.is_overdue(today) { " (overdue)" } else { "" };
    println!(
        "      due {}{}  urgency {}",
        format_due(task.due_date),
        overdue,
        task.urgency
    );
    if !task.tags.is_empty() {
        println!("      tags: {}", task.tags.join(", "));
    }
}

fn print_stats(stats: &Stats) {
    println!(
        "{} total  {} active  {} done  {} overdue",
        stats.total, stats.active, stats.completed, stats.overdue
    );
}
