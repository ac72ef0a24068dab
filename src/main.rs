#[macro_use]
extern crate prettytable;

use anyhow::{anyhow, Context};
use chrono::Local;
use directories::ProjectDirs;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

mod cli;
mod derive;
mod error;
mod interface;
mod model;
mod stats;
mod store;
mod tasks;
mod timetable;
mod transfer;

use cli::{Command::*, CommandLineArgs, TimetableCommand};
use error::Outcome;
use interface::Session;
use model::Status;
use store::Store;

fn find_default_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "gozque", "studytrack").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Logging goes to stderr; RUST_LOG overrides the verbosity flag.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "studytrack=warn",
        1 => "studytrack=debug",
        _ => "studytrack=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn run_timetable(session: &Session, action: TimetableCommand) -> error::Result<String> {
    match action {
        TimetableCommand::List => interface::timetable_week(session),
        TimetableCommand::Today => interface::timetable_today(session),
        TimetableCommand::Add { day, start, end, activity, focus } => {
            interface::timetable_add(session, day, &start, &end, &activity, &focus)
        }
        TimetableCommand::Edit { id, day, start, end, activity, focus } => {
            let fields = timetable::EntryFields {
                day,
                start_time: start,
                end_time: end,
                activity,
                focus,
            };
            interface::timetable_edit(session, &id, fields)
        }
        TimetableCommand::Rm { id } => interface::timetable_remove(session, &id),
        TimetableCommand::Export { output } => interface::export_timetable(session, output.as_deref()),
        TimetableCommand::Template { output } => interface::timetable_template(output.as_deref()),
        TimetableCommand::Import { file, mode } => interface::import_timetable(session, &file, mode),
        TimetableCommand::Seed { file } => interface::seed_timetable(session, file.as_deref()),
    }
}

fn main() -> anyhow::Result<()> {
    // Get the command-line arguments.
    let CommandLineArgs {
        action,
        data_dir,
        capacity,
        verbose,
    } = CommandLineArgs::from_args();

    init_tracing(verbose);

    // Unpack the data directory.
    let data_dir = data_dir
        .or_else(find_default_data_dir)
        .ok_or_else(|| anyhow!("Failed to find a data directory."))?;

    let store = Store::open(&data_dir)
        .with_context(|| format!("Failed to open the data directory {}.", data_dir.display()))?;

    let session = Session {
        store,
        now: Local::now(),
        capacity,
    };

    // Perform the action.
    let result = match action {
        Add { title, due, estimate, priority, steps } => {
            interface::add_task(&session, title, due, estimate, priority, steps)
        }
        List { all } => interface::list(&session, all),
        Done { id } => interface::set_status(&session, &id, Status::Done),
        Reopen { id } => interface::set_status(&session, &id, Status::Todo),
        Log { id, duration, undo } => interface::log_hours(&session, &id, duration, undo),
        Estimate { id, hours } => interface::set_estimate(&session, &id, hours),
        Due { id, date } => interface::set_due_date(&session, &id, date),
        CompletedAt { id, date } => interface::set_completed_at(&session, &id, date),
        Rm { id } => interface::remove_task(&session, &id),
        Steps { id } => interface::steps(&session, &id),
        Step { id, step, undo } => interface::update_step(&session, &id, step, undo),
        Risk { all } => interface::risk(&session, all),
        Dashboard => interface::dashboard(&session),
        Hours => interface::hours(&session),
        Export { output } => interface::export_tasks(&session, output.as_deref()),
        Template { output } => interface::task_template(output.as_deref()),
        Import { file, mode } => interface::import_tasks(&session, &file, mode),
        Timetable { action } => run_timetable(&session, action),
    };

    let outcome = Outcome::from(result);
    if outcome.ok {
        if !outcome.message.is_empty() {
            println!("{}", outcome.message);
        }
        Ok(())
    } else {
        eprintln!("Error: {}", outcome.message);
        std::process::exit(1);
    }
}
