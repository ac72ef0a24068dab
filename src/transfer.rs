//! Moving whole tables in and out: templates, exports, reconciling imports
//! and the human-formatted timetable seed.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveTime, SecondsFormat, Weekday};
use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::model::{self, Priority, Status, Task, TimetableEntry, TASK_HEADERS, TIMETABLE_HEADERS};
use crate::store::{self, Store};

/// Columns an import needs unless it carries the category/project/task triple.
pub const REQUIRED_TASK_COLUMNS: [&str; 5] = ["title", "due_date", "estimated_hours", "priority", "status"];

/// Columns that can stand in for a title.
pub const TITLE_PARTS: [&str; 3] = ["category", "project", "task"];

/// What the seed importer maps to the end of the day.
const DAY_END: &str = "20:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Keep existing rows and add the imported ones.
    Append,
    /// Drop existing rows first.
    Replace,
}

impl FromStr for ImportMode {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(ImportMode::Append),
            "replace" => Ok(ImportMode::Replace),
            other => Err(TrackerError::InvalidInput {
                field: "mode",
                reason: format!("expected append or replace, got '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub total: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Imported {} items. Total now {}.", self.added, self.total)
    }
}

/// Column lookup by header name.
struct Columns {
    headers: StringRecord,
}

impl Columns {
    fn has(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    fn get<'r>(&self, record: &'r StringRecord, name: &str) -> &'r str {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|i| record.get(i))
            .unwrap_or("")
    }

    fn first_of<'r>(&self, record: &'r StringRecord, names: &[&str]) -> &'r str {
        names
            .iter()
            .map(|name| self.get(record, name).trim())
            .find(|value| !value.is_empty())
            .unwrap_or("")
    }
}

fn csv_reader(content: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(content)
}

/// The current task table, byte for byte what is stored.
pub fn export_tasks(store: &Store) -> Result<Vec<u8>> {
    store::tasks_to_csv(&store.read_tasks()?)
}

/// Header plus one example row; the blank id is filled in on import.
pub fn task_template() -> Result<Vec<u8>> {
    let mut writer = store::csv_writer(Vec::new());
    writer.write_record(&TASK_HEADERS)?;
    writer.write_record(&[
        "",
        "Data Product Design / Project (weekly assessment)",
        "2025-10-15",
        "2.0",
        "0.0",
        "Medium",
        "todo",
        "- Research requirements\n- Create wireframes\n- Implement prototype",
        "",
        "",
    ])?;
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Import tasks from CSV content. The whole input is reconciled before the
/// table is written once; on any error nothing is written.
pub fn import_tasks(store: &Store, content: &[u8], mode: ImportMode, now: DateTime<Local>) -> Result<ImportSummary> {
    let mut reader = csv_reader(content);
    let columns = Columns { headers: reader.headers()?.clone() };

    let has_parts = TITLE_PARTS.iter().all(|c| columns.has(c));
    if !has_parts {
        let missing: Vec<String> = REQUIRED_TASK_COLUMNS
            .iter()
            .filter(|c| !columns.has(c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "import aborted");
            return Err(TrackerError::MissingColumns(missing));
        }
    }

    let mut existing = match mode {
        ImportMode::Append => store.read_tasks()?,
        ImportMode::Replace => Vec::new(),
    };
    let mut seen: HashSet<String> = existing.iter().map(|t| t.id.clone()).collect();
    let created_now = now.to_rfc3339_opts(SecondsFormat::Micros, false);

    let mut imported = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let task = match task_from_record(&columns, &record, &created_now) {
            Some(task) => task,
            None => {
                debug!(row = line + 1, "skipping row without a title");
                continue;
            }
        };
        let task = unique_id(task, &mut seen);
        imported.push(task);
    }

    let added = imported.len();
    existing.extend(imported);
    store.write_tasks(&existing)?;
    info!(added, total = existing.len(), ?mode, "tasks imported");
    Ok(ImportSummary { added, total: existing.len() })
}

fn task_from_record(columns: &Columns, record: &StringRecord, created_now: &str) -> Option<Task> {
    let mut title = columns.get(record, "title").trim().to_string();
    if title.is_empty() {
        title = TITLE_PARTS
            .iter()
            .map(|part| columns.get(record, part).trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" / ");
    }
    if title.is_empty() {
        return None;
    }

    let status = Status::from(columns.get(record, "status").to_string());
    let completed_at = match status {
        Status::Done => model::normalize_date(columns.get(record, "completed_at")),
        Status::Todo => String::new(),
    };
    let created_at = columns.get(record, "created_at");

    Some(Task {
        id: columns.get(record, "id").trim().to_string(),
        title,
        due_date: columns.get(record, "due_date").trim().to_string(),
        estimated_hours: model::coerce_hours(columns.get(record, "estimated_hours")),
        hours_logged: model::coerce_hours(columns.get(record, "hours_logged")),
        priority: Priority::from(columns.get(record, "priority").to_string()),
        status,
        steps: columns.get(record, "steps").trim().to_string(),
        created_at: if created_at.is_empty() {
            created_now.to_string()
        } else {
            created_at.to_string()
        },
        completed_at,
    })
}

// Blank ids and ids already in the table get a fresh one.
fn unique_id(mut task: Task, seen: &mut HashSet<String>) -> Task {
    if task.id.is_empty() || seen.contains(&task.id) {
        if !task.id.is_empty() {
            warn!(id = %task.id, "duplicate id replaced");
        }
        task.id = model::generate_id();
    }
    seen.insert(task.id.clone());
    task
}

pub fn export_timetable(store: &Store) -> Result<Vec<u8>> {
    store::timetable_to_csv(&store.read_timetable()?)
}

pub fn timetable_template() -> Result<Vec<u8>> {
    let mut writer = store::csv_writer(Vec::new());
    writer.write_record(&TIMETABLE_HEADERS)?;
    writer.write_record(&[
        "",
        "Monday",
        "07:00",
        "08:00",
        "Gym + Morning Routine + Breakfast",
        "Personal well-being",
    ])?;
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Import canonical timetable rows. Every column is required; rows with no
/// day or no activity are skipped.
pub fn import_timetable(store: &Store, content: &[u8], mode: ImportMode) -> Result<ImportSummary> {
    let mut reader = csv_reader(content);
    let columns = Columns { headers: reader.headers()?.clone() };

    let missing: Vec<String> = TIMETABLE_HEADERS
        .iter()
        .filter(|c| !columns.has(c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(TrackerError::MissingColumns(missing));
    }

    let mut existing = match mode {
        ImportMode::Append => store.read_timetable()?,
        ImportMode::Replace => Vec::new(),
    };
    let mut seen: HashSet<String> = existing.iter().map(|e| e.id.clone()).collect();

    let mut added = 0;
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let activity = columns.get(&record, "activity").trim();
        let day = columns.get(&record, "day").trim();
        if activity.is_empty() || day.is_empty() {
            continue;
        }
        let day = match day.parse::<Weekday>() {
            Ok(day) => day,
            Err(_) => {
                warn!(row = line + 1, day, "skipping row with unknown day");
                continue;
            }
        };

        let mut id = columns.get(&record, "id").trim().to_string();
        if id.is_empty() || seen.contains(&id) {
            id = model::generate_id();
        }
        seen.insert(id.clone());

        existing.push(TimetableEntry {
            id,
            day,
            start_time: columns.get(&record, "start_time").trim().to_string(),
            end_time: columns.get(&record, "end_time").trim().to_string(),
            activity: activity.to_string(),
            focus: columns.get(&record, "focus").trim().to_string(),
        });
        added += 1;
    }

    store.write_timetable(&existing)?;
    info!(added, total = existing.len(), "timetable imported");
    Ok(ImportSummary { added, total: existing.len() })
}

/// Replace the timetable with the rows of a human-formatted sheet with the
/// columns `Day`, `Time Slot`, `Activity` and `Focus`.
pub fn seed_timetable(store: &Store, path: &Path) -> Result<ImportSummary> {
    if !path.exists() {
        return Err(TrackerError::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read(path)?;
    let mut reader = csv_reader(&content);
    let columns = Columns { headers: reader.headers()?.clone() };

    let mut entries = Vec::new();
    let mut last_day: Option<String> = None;
    for (line, record) in reader.records().enumerate() {
        let record = record?;

        let day_text = columns.get(&record, "Day").trim();
        let day_text = if day_text.is_empty() {
            match &last_day {
                Some(day) => day.clone(),
                None => continue,
            }
        } else {
            day_text.to_string()
        };
        last_day = Some(day_text.clone());

        let slot = columns.get(&record, "Time Slot").trim();
        let activity = columns.first_of(&record, &["Activity", "Acitivity"]);
        let focus = columns.get(&record, "Focus").trim();
        if slot.is_empty() && activity.is_empty() {
            continue;
        }

        let day = match day_text.parse::<Weekday>() {
            Ok(day) => day,
            Err(_) => {
                warn!(row = line + 1, day = %day_text, "skipping row with unknown day");
                continue;
            }
        };
        let (start, end) = match slot.find('-') {
            Some(pos) => (&slot[..pos], &slot[pos + 1..]),
            None => ("", ""),
        };

        entries.push(TimetableEntry {
            id: model::generate_id(),
            day,
            start_time: to_hhmm(start),
            end_time: to_hhmm(end),
            activity: activity.to_string(),
            focus: focus.to_string(),
        });
    }

    if entries.is_empty() {
        return Err(TrackerError::NoRowsParsed);
    }
    store.write_timetable(&entries)?;
    info!(added = entries.len(), path = %path.display(), "timetable seeded");
    Ok(ImportSummary { added: entries.len(), total: entries.len() })
}

/// Turn a clock reading such as `7:00 AM`, `13:30` or `Day End` into
/// `HH:MM`. Anything unreadable gives an empty string.
pub fn to_hhmm(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    if text.to_lowercase().starts_with("day end") {
        return DAY_END.to_string();
    }
    match parse_clock(text) {
        Some(time) => time.format("%H:%M").to_string(),
        None => {
            warn!(value = %text, "unreadable time");
            String::new()
        }
    }
}

fn parse_clock(text: &str) -> Option<NaiveTime> {
    let upper = text.to_uppercase().replace('.', "");
    let upper = upper.trim();
    let (clock, pm) = if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim(), Some(false))
    } else if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim(), Some(true))
    } else {
        (upper, None)
    };

    let mut parts = clock.splitn(2, ':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(m) => m.trim().parse().ok()?,
        None => 0,
    };
    let hour = match pm {
        Some(pm) if (1..=12).contains(&hour) => hour % 12 + if pm { 12 } else { 0 },
        // a 24-hour reading with a redundant marker, like "13:30 PM"
        _ => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}
