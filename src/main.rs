mod cli;
mod commands;
mod config;
mod filter;
mod logging;
mod model;
mod service;
mod services;
mod stats;
mod storage;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = config::Config::load(args.config.as_deref())?;
    let command = args.command.unwrap_or(cli::Command::Tui);
    if !matches!(command, cli::Command::Tui) {
        logging::init_stderr();
    }
    match command {
        cli::Command::List {
            search,
            status,
            urgency,
            tag,
        } => commands::list(&config, search, status, urgency, tag),
        cli::Command::Add {
            title,
            description,
            due,
            urgency,
            tags,
        } => commands::add(&config, title, description, due, urgency, tags),
        cli::Command::Edit {
            task_id,
            title,
            description,
            due,
            urgency,
            tags,
            clear_tags,
        } => commands::edit(
            &config,
            task_id,
            title,
            description,
            due,
            urgency,
            tags,
            clear_tags,
        ),
        cli::Command::Toggle { task_id } => commands::toggle(&config, task_id),
        cli::Command::Delete { task_id, yes } => commands::delete(&config, task_id, yes),
        cli::Command::ClearCompleted { yes } => commands::clear_completed(&config, yes),
        cli::Command::Stats => commands::stats(&config),
        cli::Command::Tags => commands::tags(&config),
        cli::Command::Tui => commands::tui(&config),
    }
}
