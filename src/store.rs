use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{Task, TimetableEntry, TASK_HEADERS, TIMETABLE_HEADERS};

pub const TASKS_FILE: &str = "todos.csv";
pub const TIMETABLE_FILE: &str = "timetable.csv";

/// The two flat CSV tables the tracker keeps in its data directory.
/// Every read loads a whole table and every write replaces it.
#[derive(Debug, Clone)]
pub struct Store {
    tasks_path: PathBuf,
    timetable_path: PathBuf,
}

impl Store {
    /// Open the store in `dir`, creating the directory and empty tables
    /// (header only) when they do not exist yet.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Store> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let store = Store {
            tasks_path: dir.join(TASKS_FILE),
            timetable_path: dir.join(TIMETABLE_FILE),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    pub fn tasks_path(&self) -> &Path {
        &self.tasks_path
    }

    pub fn timetable_path(&self) -> &Path {
        &self.timetable_path
    }

    fn ensure_tables(&self) -> Result<()> {
        if is_missing_or_empty(&self.tasks_path) {
            debug!(path = %self.tasks_path.display(), "creating task table");
            self.write_tasks(&[])?;
        }
        if is_missing_or_empty(&self.timetable_path) {
            debug!(path = %self.timetable_path.display(), "creating timetable");
            self.write_timetable(&[])?;
        }
        Ok(())
    }

    pub fn read_tasks(&self) -> Result<Vec<Task>> {
        self.ensure_tables()?;
        let mut reader = csv::Reader::from_path(&self.tasks_path)?;
        let mut tasks = Vec::new();
        for task in reader.deserialize() {
            tasks.push(task?);
        }
        debug!(count = tasks.len(), "read tasks");
        Ok(tasks)
    }

    pub fn write_tasks(&self, tasks: &[Task]) -> Result<()> {
        write_atomically(&self.tasks_path, &tasks_to_csv(tasks)?)?;
        debug!(count = tasks.len(), "wrote tasks");
        Ok(())
    }

    /// Read the timetable. Rows that cannot be decoded (an unknown day for
    /// instance) are skipped.
    pub fn read_timetable(&self) -> Result<Vec<TimetableEntry>> {
        self.ensure_tables()?;
        let mut reader = csv::Reader::from_path(&self.timetable_path)?;
        let mut entries = Vec::new();
        for (line, entry) in reader.deserialize::<TimetableEntry>().enumerate() {
            match entry {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(row = line + 1, error = %e, "skipping timetable row"),
            }
        }
        debug!(count = entries.len(), "read timetable");
        Ok(entries)
    }

    pub fn write_timetable(&self, entries: &[TimetableEntry]) -> Result<()> {
        write_atomically(&self.timetable_path, &timetable_to_csv(entries)?)?;
        debug!(count = entries.len(), "wrote timetable");
        Ok(())
    }
}

/// Encode tasks with the canonical header, the exact bytes of the task file.
pub fn tasks_to_csv(tasks: &[Task]) -> Result<Vec<u8>> {
    encode(&TASK_HEADERS, tasks)
}

/// Encode timetable entries with the canonical header.
pub fn timetable_to_csv(entries: &[TimetableEntry]) -> Result<Vec<u8>> {
    encode(&TIMETABLE_HEADERS, entries)
}

/// Shared writer setup: minimal quoting and CRLF terminators.
pub fn csv_writer<W: std::io::Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_writer(out)
}

fn encode<T: Serialize>(headers: &[&str], rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

fn is_missing_or_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

// The new content lands in a sibling file first so a failed write never
// leaves a half-written table behind.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, Status};
    use chrono::Weekday;
    use tempfile::{tempdir, TempDir};

    fn setup_store() -> (Store, TempDir) {
        let dir = tempdir().expect("Failed to create temp directory for test store");
        let store = Store::open(dir.path()).expect("Failed to open test store");
        (store, dir)
    }

    fn sample_task() -> Task {
        Task {
            id: "abc".into(),
            title: "Cloud Computing, week 2".into(),
            due_date: "2025-10-15".into(),
            estimated_hours: 2.0,
            hours_logged: 0.5,
            priority: Priority::High,
            status: Status::Todo,
            steps: "- Read \"intro\"\n✓ Notes".into(),
            created_at: "2025-10-06T09:00:00.000000-04:00".into(),
            completed_at: String::new(),
        }
    }

    #[test]
    fn test_open_creates_header_only_tables() {
        let (store, _dir) = setup_store();
        let tasks = fs::read_to_string(store.tasks_path()).unwrap();
        assert_eq!(
            tasks,
            "id,title,due_date,estimated_hours,hours_logged,priority,status,steps,created_at,completed_at\r\n"
        );
        let timetable = fs::read_to_string(store.timetable_path()).unwrap();
        assert_eq!(timetable, "id,day,start_time,end_time,activity,focus\r\n");
        assert!(store.read_tasks().unwrap().is_empty());
    }

    #[test]
    fn test_tasks_survive_write_and_read() {
        let (store, _dir) = setup_store();
        store.write_tasks(&[sample_task()]).unwrap();
        assert_eq!(store.read_tasks().unwrap(), vec![sample_task()]);
    }

    #[test]
    fn test_task_row_encoding() {
        let bytes = tasks_to_csv(&[sample_task()]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let row = text.split("\r\n").nth(1).unwrap();
        assert!(row.starts_with("abc,\"Cloud Computing, week 2\",2025-10-15,2.00,0.50,High,todo,"));
        assert!(text.contains("\"- Read \"\"intro\"\"\n✓ Notes\""));
        assert!(text.ends_with("2025-10-06T09:00:00.000000-04:00,\r\n"));
    }

    #[test]
    fn test_lenient_fields_on_read() {
        let (store, _dir) = setup_store();
        fs::write(
            store.tasks_path(),
            "id,title,due_date,estimated_hours,hours_logged,priority,status,steps,created_at,completed_at\n\
             x1,Essay,2025-11-01,abc,,urgent,waiting,,,\n",
        )
        .unwrap();
        let tasks = store.read_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].estimated_hours, 0.0);
        assert_eq!(tasks[0].hours_logged, 0.0);
        assert_eq!(tasks[0].priority, Priority::Medium);
        assert_eq!(tasks[0].status, Status::Todo);
        assert_eq!(tasks[0].completed_at, "");
    }

    #[test]
    fn test_older_table_without_optional_columns() {
        let (store, _dir) = setup_store();
        fs::write(
            store.tasks_path(),
            "id,title,due_date,estimated_hours,priority,status\nx1,Essay,2025-11-01,3,Low,todo\n",
        )
        .unwrap();
        let tasks = store.read_tasks().unwrap();
        assert_eq!(tasks[0].estimated_hours, 3.0);
        assert_eq!(tasks[0].steps, "");
        assert_eq!(tasks[0].hours_logged, 0.0);
    }

    #[test]
    fn test_timetable_skips_unknown_days() {
        let (store, _dir) = setup_store();
        fs::write(
            store.timetable_path(),
            "id,day,start_time,end_time,activity,focus\n\
             t1,Monday,07:00,08:00,Gym,Personal well-being\n\
             t2,Someday,09:00,10:00,Lecture,\n",
        )
        .unwrap();
        let entries = store.read_timetable().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].day, Weekday::Mon);
        assert_eq!(entries[0].focus, "Personal well-being");
    }

    #[test]
    fn test_emptied_file_is_recreated() {
        let (store, _dir) = setup_store();
        fs::write(store.tasks_path(), "").unwrap();
        assert!(store.read_tasks().unwrap().is_empty());
        assert!(fs::read_to_string(store.tasks_path()).unwrap().starts_with("id,title"));
    }
}
