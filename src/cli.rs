use chrono::{NaiveDate, Weekday};
use humantime::parse_duration;
use std::path::PathBuf;
use structopt::StructOpt;

use crate::model::{self, Priority};
use crate::transfer::ImportMode;

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Add a new task.
    Add {
        /// The task title. A "Category - Step" title gets its step derived.
        #[structopt()]
        title: String,

        /// Due date (YYYY-MM-DD). Defaults to a week from today.
        #[structopt(short, long, parse(try_from_str = parse_date))]
        due: Option<NaiveDate>,

        /// Estimated effort, in hours ("1.5") or as a duration ("1h 30m").
        #[structopt(short, long, default_value = "2", parse(try_from_str = parse_hours))]
        estimate: f64,

        /// Low, Medium or High.
        #[structopt(short, long, default_value = "Medium")]
        priority: Priority,

        /// A step of the task; repeat for several.
        #[structopt(short, long = "step", number_of_values = 1)]
        steps: Vec<String>,
    },
    /// List tasks grouped by category.
    List {
        /// Include done tasks.
        #[structopt(short, long)]
        all: bool,
    },
    /// Mark a task as done.
    Done {
        #[structopt()]
        id: String,
    },
    /// Mark a done task as todo again.
    Reopen {
        #[structopt()]
        id: String,
    },
    /// Log time against a task.
    Log {
        #[structopt()]
        id: String,

        /// Time spent, in hours ("0.75") or as a duration ("45m").
        #[structopt(parse(try_from_str = parse_hours))]
        duration: f64,

        /// Remove the time instead of adding it.
        #[structopt(long)]
        undo: bool,
    },
    /// Change the estimated hours of a task.
    Estimate {
        #[structopt()]
        id: String,

        #[structopt(parse(try_from_str = parse_hours))]
        hours: f64,
    },
    /// Change the due date of a task.
    Due {
        #[structopt()]
        id: String,

        #[structopt(parse(try_from_str = parse_date))]
        date: NaiveDate,
    },
    /// Set or clear the completion date of a done task.
    CompletedAt {
        #[structopt()]
        id: String,

        /// Any common date layout; leave out to clear.
        #[structopt()]
        date: Option<String>,
    },
    /// Delete a task. There is no undo.
    Rm {
        #[structopt()]
        id: String,
    },
    /// Show the steps of a task and its progress.
    Steps {
        #[structopt()]
        id: String,
    },
    /// Tick a step of a task (by the number shown in `steps`).
    Step {
        #[structopt()]
        id: String,

        #[structopt()]
        step: usize,

        /// Untick the step instead.
        #[structopt(long)]
        undo: bool,
    },
    /// Rank tasks by risk of missing their due date.
    Risk {
        /// Include done tasks.
        #[structopt(short, long)]
        all: bool,
    },
    /// Overview of progress: totals, categories, hours per day and deadlines.
    Dashboard,
    /// Tasks with logged hours and the totals.
    Hours,
    /// Write the task table as CSV.
    Export {
        /// Output file; standard output when left out.
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Write an example CSV ready to be filled in and imported.
    Template {
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Import tasks from a CSV file, or from standard input with `-`.
    Import {
        #[structopt(parse(from_os_str))]
        file: PathBuf,

        /// append or replace.
        #[structopt(short, long, default_value = "append")]
        mode: ImportMode,
    },
    /// Manage the weekly timetable.
    Timetable {
        #[structopt(subcommand)]
        action: TimetableCommand,
    },
}

#[derive(Debug, StructOpt)]
pub enum TimetableCommand {
    /// The whole week.
    List,
    /// Today's focus.
    Today,
    /// Add a slot.
    Add {
        #[structopt(parse(try_from_str = parse_day))]
        day: Weekday,

        /// Start time (HH:MM).
        #[structopt()]
        start: String,

        /// End time (HH:MM).
        #[structopt()]
        end: String,

        #[structopt()]
        activity: String,

        #[structopt(short, long, default_value = "")]
        focus: String,
    },
    /// Change fields of a slot.
    Edit {
        #[structopt()]
        id: String,

        #[structopt(long, parse(try_from_str = parse_day))]
        day: Option<Weekday>,

        #[structopt(long)]
        start: Option<String>,

        #[structopt(long)]
        end: Option<String>,

        #[structopt(long)]
        activity: Option<String>,

        #[structopt(long)]
        focus: Option<String>,
    },
    /// Delete a slot.
    Rm {
        #[structopt()]
        id: String,
    },
    /// Write the timetable as CSV.
    Export {
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Write an example timetable CSV.
    Template {
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Import timetable rows from a CSV file, or from standard input with `-`.
    Import {
        #[structopt(parse(from_os_str))]
        file: PathBuf,

        #[structopt(short, long, default_value = "append")]
        mode: ImportMode,
    },
    /// Replace the timetable with a sheet of Day, Time Slot, Activity, Focus.
    /// Without a sheet, loads an example week.
    Seed {
        #[structopt(parse(from_os_str))]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "studytrack",
    about = "A minimalistic study task tracker."
)]
pub struct CommandLineArgs {
    #[structopt(subcommand)]
    pub action: Command,

    /// Use a different data directory.
    #[structopt(parse(from_os_str), short, long, env = "STUDYTRACK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Hours per day available for study, used by the risk ranking.
    #[structopt(short, long, default_value = "2", env = "STUDYTRACK_CAPACITY", parse(try_from_str = parse_capacity))]
    pub capacity: f64,

    /// More logging (-v debug, -vv trace).
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,
}

/// Hours given as a plain number or as a humantime duration.
pub fn parse_hours(src: &str) -> Result<f64, String> {
    let src = src.trim();
    if let Ok(hours) = src.parse::<f64>() {
        if hours.is_finite() && hours >= 0.0 {
            return Ok(hours);
        }
        return Err(format!("'{}' is not a positive number of hours", src));
    }
    parse_duration(src)
        .map(|d| d.as_secs_f64() / 3600.0)
        .map_err(|e| format!("'{}' is not a number of hours nor a duration: {}", src, e))
}

pub fn parse_capacity(src: &str) -> Result<f64, String> {
    let hours = parse_hours(src)?;
    if hours > 0.0 {
        Ok(hours)
    } else {
        Err("daily capacity must be greater than zero".to_string())
    }
}

pub fn parse_date(src: &str) -> Result<NaiveDate, String> {
    model::parse_date_lenient(src).ok_or_else(|| format!("'{}' is not a date (use YYYY-MM-DD)", src))
}

pub fn parse_day(src: &str) -> Result<Weekday, String> {
    src.trim()
        .parse::<Weekday>()
        .map_err(|_| format!("'{}' is not a day of the week", src))
}
