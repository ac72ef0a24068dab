use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate};
use prettytable::Table;

use crate::derive::{self, RiskEntry};
use crate::error::{Result, TrackerError};
use crate::model::{self, Status, Task, TimetableEntry};
use crate::stats;
use crate::store::Store;
use crate::tasks::{self, NewTask};
use crate::timetable::{self, EntryFields};
use crate::transfer::{self, ImportMode};

const TITLE_WIDTH: usize = 48;
const SHORT_ID_LEN: usize = 8;
const DEFAULT_DUE_DAYS: i64 = 7;
const STDIN_PATH: &str = "-";

/// Everything a command needs: the store, the moment it runs and the
/// configured daily capacity.
pub struct Session {
    pub store: Store,
    pub now: DateTime<Local>,
    pub capacity: f64,
}

impl Session {
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

pub fn add_task(
    session: &Session,
    title: String,
    due: Option<NaiveDate>,
    estimated_hours: f64,
    priority: model::Priority,
    steps: Vec<String>,
) -> Result<String> {
    let new = NewTask {
        title,
        due_date: due.unwrap_or_else(|| session.today() + Duration::days(DEFAULT_DUE_DAYS)),
        estimated_hours,
        priority,
        steps,
    };
    let task = tasks::add_task(&session.store, new, session.now)?;
    Ok(format!(
        "{} {} (due {}, {} h)",
        short_id(&task.id),
        task.title,
        task.due_date,
        model::format_hours(task.estimated_hours)
    ))
}

pub fn list(session: &Session, all: bool) -> Result<String> {
    let rows = session.store.read_tasks()?;
    let (done, open): (Vec<&Task>, Vec<&Task>) = rows.iter().partition(|t| t.is_done());

    if !open.is_empty() {
        task_table(stats::by_category(open.iter().copied()), session.today()).printstd();
    }
    if all && !done.is_empty() {
        println!("Completed:");
        task_table(stats::by_category(done.iter().copied()), session.today()).printstd();
    }

    if rows.is_empty() {
        Ok("No tasks yet. Use 'studytrack add' to add one.".to_string())
    } else if open.is_empty() {
        Ok(format!("No open tasks. {} done.", done.len()))
    } else {
        Ok(format!("{} open, {} done.", open.len(), done.len()))
    }
}

fn task_table(groups: Vec<(String, Vec<&Task>)>, today: NaiveDate) -> Table {
    let mut table = Table::new();
    table.add_row(row!["category", "id", "task", "due", "est.", "logged", "priority", "steps"]);
    for (category, members) in groups {
        let mut label = wrap(&category);
        for task in members {
            let progress = derive::progress(&derive::parse_steps(&task.steps));
            let steps = if progress.total > 0 {
                format!("{}/{}", progress.completed, progress.total)
            } else {
                String::new()
            };
            let title = if task.is_done() {
                wrap(&task.title)
            } else if task.is_overdue(today) {
                format!("{} (overdue)", wrap(&task.title))
            } else {
                wrap(&task.title)
            };
            table.add_row(row![
                label,
                short_id(&task.id),
                title,
                task.due_date,
                model::format_hours(task.estimated_hours),
                model::format_hours(task.hours_logged),
                task.priority,
                steps
            ]);
            label = String::new();
        }
    }
    table
}

pub fn set_status(session: &Session, id: &str, status: Status) -> Result<String> {
    let task = tasks::set_status(&session.store, id, status, session.today())?;
    Ok(match status {
        Status::Done => format!(
            "Done: {} ({} h logged, completed {}).",
            task.title,
            model::format_hours(task.hours_logged),
            task.completed_at
        ),
        Status::Todo => format!("Reopened: {}.", task.title),
    })
}

pub fn log_hours(session: &Session, id: &str, hours: f64, undo: bool) -> Result<String> {
    let delta = if undo { -hours } else { hours };
    let task = tasks::log_hours(&session.store, id, delta)?;
    Ok(format!(
        "{}: {} of {} h logged.",
        task.title,
        model::format_hours(task.hours_logged),
        model::format_hours(task.estimated_hours)
    ))
}

pub fn set_estimate(session: &Session, id: &str, hours: f64) -> Result<String> {
    let task = tasks::set_estimate(&session.store, id, hours)?;
    Ok(format!("{}: estimate {} h.", task.title, model::format_hours(task.estimated_hours)))
}

pub fn set_due_date(session: &Session, id: &str, date: NaiveDate) -> Result<String> {
    let task = tasks::set_due_date(&session.store, id, date)?;
    Ok(format!("{}: due {}.", task.title, task.due_date))
}

pub fn set_completed_at(session: &Session, id: &str, date: Option<String>) -> Result<String> {
    let task = tasks::set_completed_at(&session.store, id, date.as_deref().unwrap_or(""))?;
    if task.completed_at.is_empty() {
        Ok(format!("{}: completion date cleared.", task.title))
    } else {
        Ok(format!("{}: completed {}.", task.title, task.completed_at))
    }
}

pub fn remove_task(session: &Session, id: &str) -> Result<String> {
    let task = tasks::delete_task(&session.store, id)?;
    Ok(format!("Deleted: {}.", task.title))
}

pub fn steps(session: &Session, id: &str) -> Result<String> {
    let (task, steps) = tasks::task_steps(&session.store, id)?;
    if steps.is_empty() {
        return Ok(format!("{} has no steps.", task.title));
    }

    let mut table = Table::new();
    table.add_row(row!["#", "", "step"]);
    for step in &steps {
        let mark = if step.completed { "✓" } else { " " };
        table.add_row(row![step.id, mark, wrap(&step.description)]);
    }
    println!("{}", task.title);
    table.printstd();

    let progress = derive::progress(&steps);
    Ok(format!(
        "{}/{} steps done ({:.1}%).",
        progress.completed, progress.total, progress.percentage
    ))
}

pub fn update_step(session: &Session, id: &str, step: usize, undo: bool) -> Result<String> {
    let task = tasks::update_step(&session.store, id, step, !undo, session.today())?;
    let progress = derive::progress(&derive::parse_steps(&task.steps));
    let mut message = format!(
        "{}: {}/{} steps done ({:.1}%).",
        task.title, progress.completed, progress.total, progress.percentage
    );
    if task.is_done() {
        message.push_str(" Task done.");
    }
    Ok(message)
}

pub fn risk(session: &Session, all: bool) -> Result<String> {
    let rows = session.store.read_tasks()?;
    let ranked = derive::rank_by_risk(
        rows.iter().filter(|t| all || !t.is_done()),
        session.today(),
        session.capacity,
    );
    if ranked.is_empty() {
        return Ok("No risk yet. Add due dates and estimates.".to_string());
    }
    risk_table(&ranked).printstd();
    Ok(format!("Daily capacity: {} h.", model::format_hours(session.capacity)))
}

fn risk_table(ranked: &[RiskEntry]) -> Table {
    let mut table = Table::new();
    table.add_row(row!["id", "task", "due", "remaining", "risk"]);
    for entry in ranked {
        table.add_row(row![
            short_id(&entry.id),
            wrap(&entry.title),
            entry.due_date,
            model::format_hours(entry.remaining_hours),
            fmt_risk(entry.risk)
        ]);
    }
    table
}

pub fn dashboard(session: &Session) -> Result<String> {
    let rows = session.store.read_tasks()?;
    if rows.is_empty() {
        return Ok("Add tasks to see the dashboard.".to_string());
    }
    let today = session.today();

    let kpis = stats::kpis(&rows, today);
    let mut table = Table::new();
    table.add_row(row!["total", "completed", "remaining", "overdue"]);
    table.add_row(row![
        kpis.total,
        format!("{} ({:.0}%)", kpis.completed, kpis.completion_percentage),
        kpis.remaining,
        kpis.overdue
    ]);
    table.printstd();

    let mut table = Table::new();
    table.add_row(row!["category", "todo", "done"]);
    for (category, counts) in stats::category_status(&rows) {
        table.add_row(row![wrap(&category), counts.todo, counts.done]);
    }
    table.printstd();

    let category_hours = stats::category_hours(&rows);
    if !category_hours.is_empty() {
        let mut table = Table::new();
        table.add_row(row!["category", "hours logged"]);
        for (category, hours) in category_hours {
            table.add_row(row![wrap(&category), model::format_hours(hours)]);
        }
        table.printstd();
    }

    let mut table = Table::new();
    table.add_row(row!["day", "hours logged"]);
    for (day, hours) in stats::hours_per_day(&rows) {
        table.add_row(row![day, format!("{:.1}", hours)]);
    }
    table.printstd();

    let mut table = Table::new();
    table.add_row(row!["id", "upcoming", "due", "priority", "est.", "logged"]);
    for task in stats::upcoming(&rows) {
        table.add_row(row![
            short_id(&task.id),
            wrap(&task.title),
            task.due_date,
            task.priority,
            model::format_hours(task.estimated_hours),
            model::format_hours(task.hours_logged)
        ]);
    }
    table.printstd();

    let ranked = derive::rank_by_risk(rows.iter().filter(|t| !t.is_done()), today, session.capacity);
    if !ranked.is_empty() {
        risk_table(&ranked).printstd();
    }

    Ok(format!("{} of {} tasks done.", kpis.completed, kpis.total))
}

pub fn hours(session: &Session) -> Result<String> {
    let rows = session.store.read_tasks()?;
    let summary = stats::logged_summary(&rows);
    if summary.tasks.is_empty() {
        return Ok("No hours logged yet. Use 'studytrack log' to log time.".to_string());
    }

    let mut table = Table::new();
    table.add_row(row!["id", "task", "logged", "est.", "status", "due"]);
    for task in &summary.tasks {
        table.add_row(row![
            short_id(&task.id),
            wrap(&task.title),
            model::format_hours(task.hours_logged),
            model::format_hours(task.estimated_hours),
            task.status,
            task.due_date
        ]);
    }
    table.printstd();

    Ok(format!(
        "{:.1} h logged of {:.1} h estimated ({:.1}%).",
        summary.total_logged, summary.total_estimated, summary.progress_percentage
    ))
}

pub fn export_tasks(session: &Session, output: Option<&Path>) -> Result<String> {
    let bytes = transfer::export_tasks(&session.store)?;
    emit(&bytes, output, "tasks")
}

pub fn task_template(output: Option<&Path>) -> Result<String> {
    emit(&transfer::task_template()?, output, "task template")
}

pub fn import_tasks(session: &Session, file: &Path, mode: ImportMode) -> Result<String> {
    let content = read_input(file, std::io::stdin())?;
    let summary = transfer::import_tasks(&session.store, &content, mode, session.now)?;
    Ok(summary.to_string())
}

pub fn timetable_week(session: &Session) -> Result<String> {
    let entries = session.store.read_timetable()?;
    if entries.is_empty() {
        return Ok("The timetable is empty. Use 'studytrack timetable seed' to load one.".to_string());
    }
    let week = timetable::weekly(&entries);
    timetable_table(&week, true).printstd();
    Ok(format!("{} slots.", week.len()))
}

pub fn timetable_today(session: &Session) -> Result<String> {
    let day = session.now.weekday();
    let entries = timetable::for_day(&session.store.read_timetable()?, day);
    println!("Today's focus: {}", model::weekday_name(day));
    if entries.is_empty() {
        return Ok("No entries for today.".to_string());
    }
    timetable_table(&entries, false).printstd();
    Ok(format!("{} slots today.", entries.len()))
}

fn timetable_table(entries: &[TimetableEntry], with_day: bool) -> Table {
    let mut table = Table::new();
    if with_day {
        table.add_row(row!["id", "day", "start", "end", "activity", "focus"]);
    } else {
        table.add_row(row!["id", "start", "end", "activity", "focus"]);
    }
    for entry in entries {
        if with_day {
            table.add_row(row![
                short_id(&entry.id),
                model::weekday_name(entry.day),
                entry.start_time,
                entry.end_time,
                wrap(&entry.activity),
                wrap(&entry.focus)
            ]);
        } else {
            table.add_row(row![
                short_id(&entry.id),
                entry.start_time,
                entry.end_time,
                wrap(&entry.activity),
                wrap(&entry.focus)
            ]);
        }
    }
    table
}

pub fn timetable_add(
    session: &Session,
    day: chrono::Weekday,
    start: &str,
    end: &str,
    activity: &str,
    focus: &str,
) -> Result<String> {
    let entry = timetable::add_entry(&session.store, day, start, end, activity, focus)?;
    Ok(format!(
        "{} {} {}-{} {}",
        short_id(&entry.id),
        model::weekday_name(entry.day),
        entry.start_time,
        entry.end_time,
        entry.activity
    ))
}

pub fn timetable_edit(session: &Session, id: &str, fields: EntryFields) -> Result<String> {
    let entry = timetable::update_entry(&session.store, id, fields)?;
    Ok(format!(
        "{} {} {}-{} {}",
        short_id(&entry.id),
        model::weekday_name(entry.day),
        entry.start_time,
        entry.end_time,
        entry.activity
    ))
}

pub fn timetable_remove(session: &Session, id: &str) -> Result<String> {
    let entry = timetable::delete_entry(&session.store, id)?;
    Ok(format!("Deleted: {} {}.", model::weekday_name(entry.day), entry.activity))
}

pub fn export_timetable(session: &Session, output: Option<&Path>) -> Result<String> {
    emit(&transfer::export_timetable(&session.store)?, output, "timetable")
}

pub fn timetable_template(output: Option<&Path>) -> Result<String> {
    emit(&transfer::timetable_template()?, output, "timetable template")
}

pub fn import_timetable(session: &Session, file: &Path, mode: ImportMode) -> Result<String> {
    let content = read_input(file, std::io::stdin())?;
    let summary = transfer::import_timetable(&session.store, &content, mode)?;
    Ok(summary.to_string())
}

pub fn seed_timetable(session: &Session, file: Option<&Path>) -> Result<String> {
    match file {
        Some(file) => {
            let summary = transfer::seed_timetable(&session.store, file)?;
            Ok(format!("Loaded {} rows from {}.", summary.added, file.display()))
        }
        None => {
            let entries = timetable::seed_example(&session.store)?;
            Ok(format!("Loaded the example week ({} rows).", entries.len()))
        }
    }
}

/// Content to import: the file, or everything on `stdin` when the file is `-`.
fn read_input<R: Read>(file: &Path, mut stdin: R) -> Result<Vec<u8>> {
    if file == Path::new(STDIN_PATH) {
        let mut content = Vec::new();
        stdin.read_to_end(&mut content)?;
        return Ok(content);
    }
    if !file.exists() {
        return Err(TrackerError::FileNotFound(file.to_path_buf()));
    }
    Ok(fs::read(file)?)
}

/// Write CSV bytes to a file, or to standard output when no file is given.
fn emit(bytes: &[u8], output: Option<&Path>, what: &str) -> Result<String> {
    match output {
        Some(path) => {
            fs::write(path, bytes)?;
            Ok(format!("Saved {} to {}.", what, path.display()))
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(bytes)?;
            handle.flush()?;
            Ok(String::new())
        }
    }
}

fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

fn wrap(text: &str) -> String {
    textwrap::fill(text, TITLE_WIDTH)
}

fn fmt_risk(risk: f64) -> String {
    if risk.is_infinite() {
        "∞".to_string()
    } else {
        format!("{:.2}", risk)
    }
}
