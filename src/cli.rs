use crate::filter::StatusFilter;
use crate::model::Urgency;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskflow", version, about = "Filterable to-do list for the terminal")]
pub struct Cli {
    /// Path to a config.yml (defaults to the per-user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List tasks, incomplete first and then by due date
    List {
        /// Case-insensitive text to find in title or description
        #[arg(long, short = 's', default_value = "")]
        search: String,
        /// all, active or completed
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        /// Only tasks with this urgency
        #[arg(long, short = 'u')]
        urgency: Option<Urgency>,
        /// Only tasks carrying this tag
        #[arg(long, short = 't')]
        tag: Option<String>,
    },
    /// Add a new task
    Add {
        /// Title of the task
        title: String,
        /// Optional description
        #[arg(long, short = 'd', default_value = "")]
        description: String,
        /// Due date in YYYY-MM-DD format (defaults to today)
        #[arg(long)]
        due: Option<String>,
        /// low, medium, high or critical (defaults to the configured urgency)
        #[arg(long, short = 'u')]
        urgency: Option<Urgency>,
        /// Tags for the task (repeatable)
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
    },
    /// Edit an existing task
    Edit {
        /// Task id to edit
        task_id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long, short = 'd')]
        description: Option<String>,
        /// New due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// New urgency
        #[arg(long, short = 'u')]
        urgency: Option<Urgency>,
        /// Replace tags (repeatable)
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
        /// Remove all tags
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },
    /// Mark a task done, or not done again
    Toggle {
        task_id: String,
    },
    /// Delete a task
    Delete {
        task_id: String,
        /// Do not ask for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Remove every completed task
    ClearCompleted {
        /// Do not ask for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show task counts
    Stats,
    /// List the known tags and how many tasks use each
    Tags,
    /// Launch the interactive TUI
    Tui,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_list_filters() {
        let cli = Cli::try_parse_from([
            "taskflow", "list", "--status", "active", "-u", "high", "--tag", "Work",
        ])
        .unwrap();
        match cli.command {
            Some(Command::List {
                status,
                urgency,
                tag,
                search,
            }) => {
                assert_eq!(status, StatusFilter::Active);
                assert_eq!(urgency, Some(Urgency::High));
                assert_eq!(tag.as_deref(), Some("Work"));
                assert!(search.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_urgency_and_tag_conflicts() {
        assert!(Cli::try_parse_from(["taskflow", "add", "x", "-u", "extreme"]).is_err());
        assert!(
            Cli::try_parse_from(["taskflow", "edit", "id", "-t", "Work", "--clear-tags"]).is_err()
        );
    }

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["taskflow"]).unwrap();
        assert!(cli.command.is_none());
    }
}
