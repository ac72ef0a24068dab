use chrono::{DateTime, Local, NaiveDate, SecondsFormat};
use tracing::info;

use crate::derive::{self, Progress};
use crate::error::{Result, TrackerError};
use crate::model::{self, Priority, Status, Step, Task, DEFAULT_COMPLETION_HOURS};
use crate::store::Store;

/// What the user typed to create a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub due_date: NaiveDate,
    pub estimated_hours: f64,
    pub priority: Priority,
    pub steps: Vec<String>,
}

impl Task {
    /// Move the task to `status`. Completing stamps today's date and logs
    /// the estimate when nothing was logged. Reopening clears the date and,
    /// when every step is ticked, unticks the last one so the task does not
    /// read as finished.
    pub fn set_status(&mut self, status: Status, today: NaiveDate) {
        match status {
            Status::Done => self.complete(today),
            Status::Todo => self.reopen(),
        }
    }

    fn reopen(&mut self) {
        self.status = Status::Todo;
        self.completed_at.clear();

        let mut steps = derive::parse_steps(&self.steps);
        if steps.iter().all(|step| step.completed) {
            if let Some(last) = steps.iter_mut().max_by_key(|step| step.order) {
                last.completed = false;
                self.steps = derive::format_steps(&steps);
            }
        }
    }

    fn complete(&mut self, today: NaiveDate) {
        self.status = Status::Done;
        self.completed_at = model::format_date(today);
        if self.hours_logged == 0.0 {
            if self.estimated_hours == 0.0 {
                self.estimated_hours = DEFAULT_COMPLETION_HOURS;
            }
            self.hours_logged = self.estimated_hours;
        }
    }

    /// Tick or untick one step. Once every step is ticked the task is
    /// completed; unticking never reopens it.
    pub fn update_step(&mut self, step_id: usize, completed: bool, today: NaiveDate) -> Result<()> {
        let mut steps = derive::parse_steps(&self.steps);
        let step = steps
            .iter_mut()
            .find(|step| step.id == step_id)
            .ok_or_else(|| TrackerError::StepNotFound { task: self.id.clone(), step: step_id })?;
        step.completed = completed;
        self.steps = derive::format_steps(&steps);

        if !steps.is_empty() && steps.iter().all(|step| step.completed) {
            self.complete(today);
        }
        Ok(())
    }

    /// Give a task without steps a single step taken from its title, when
    /// the title has a `" - "` part. Returns whether the blob changed.
    pub fn derive_steps(&mut self) -> bool {
        if !derive::parse_steps(&self.steps).is_empty() {
            return false;
        }
        match derive::title_suffix(&self.title) {
            Some(description) => {
                self.steps = derive::steps_blob(&[description]);
                !self.steps.is_empty()
            }
            None => false,
        }
    }
}

/// Create a task and append it to the table.
pub fn add_task(store: &Store, new: NewTask, now: DateTime<Local>) -> Result<Task> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(TrackerError::InvalidInput {
            field: "title",
            reason: "cannot be empty".into(),
        });
    }
    let estimated_hours = validate_hours("estimated_hours", new.estimated_hours)?;

    let task = Task {
        id: model::generate_id(),
        title: title.to_string(),
        due_date: model::format_date(new.due_date),
        estimated_hours: estimated_hours.max(0.0),
        hours_logged: 0.0,
        priority: new.priority,
        status: Status::Todo,
        steps: derive::steps_blob(&new.steps),
        created_at: now.to_rfc3339_opts(SecondsFormat::Micros, false),
        completed_at: String::new(),
    };

    let mut tasks = store.read_tasks()?;
    tasks.push(task.clone());
    store.write_tasks(&tasks)?;
    info!(id = %task.id, title = %task.title, "task added");
    Ok(task)
}

/// Load the table, apply `change` to the task matching `id` and write the
/// table back. Nothing is written when `change` fails.
fn modify_task<F>(store: &Store, id: &str, change: F) -> Result<Task>
where
    F: FnOnce(&mut Task) -> Result<()>,
{
    let mut tasks = store.read_tasks()?;
    let pos = model::position_by_id(&tasks, id, "Task", |t: &Task| t.id.as_str())?;
    change(&mut tasks[pos])?;
    store.write_tasks(&tasks)?;
    Ok(tasks.swap_remove(pos))
}

pub fn set_status(store: &Store, id: &str, status: Status, today: NaiveDate) -> Result<Task> {
    let task = modify_task(store, id, |task| {
        task.set_status(status, today);
        Ok(())
    })?;
    info!(id = %task.id, %status, "status changed");
    Ok(task)
}

/// Add `delta` hours (possibly negative) to the logged time, never going
/// below zero.
pub fn log_hours(store: &Store, id: &str, delta: f64) -> Result<Task> {
    let delta = validate_hours("hours", delta)?;
    let task = modify_task(store, id, |task| {
        task.hours_logged = (task.hours_logged + delta).max(0.0);
        Ok(())
    })?;
    info!(id = %task.id, delta, total = task.hours_logged, "hours logged");
    Ok(task)
}

pub fn set_estimate(store: &Store, id: &str, hours: f64) -> Result<Task> {
    let hours = validate_hours("estimated_hours", hours)?;
    let task = modify_task(store, id, |task| {
        task.estimated_hours = hours.max(0.0);
        Ok(())
    })?;
    info!(id = %task.id, hours = task.estimated_hours, "estimate changed");
    Ok(task)
}

pub fn set_due_date(store: &Store, id: &str, due_date: NaiveDate) -> Result<Task> {
    let task = modify_task(store, id, |task| {
        task.due_date = model::format_date(due_date);
        Ok(())
    })?;
    info!(id = %task.id, %due_date, "due date changed");
    Ok(task)
}

/// Edit the completion date directly. Blank text clears it; anything else
/// is only accepted on a done task and reduced to a bare date, or to its
/// first ten characters when it does not read as one.
pub fn set_completed_at(store: &Store, id: &str, text: &str) -> Result<Task> {
    let text = text.trim();
    let task = modify_task(store, id, |task| {
        if text.is_empty() {
            task.completed_at.clear();
            return Ok(());
        }
        if !task.is_done() {
            return Err(TrackerError::InvalidInput {
                field: "completed_at",
                reason: "only done tasks have a completion date".into(),
            });
        }
        task.completed_at = model::normalize_date(text);
        Ok(())
    })?;
    info!(id = %task.id, "completion date changed");
    Ok(task)
}

/// Remove a task for good.
pub fn delete_task(store: &Store, id: &str) -> Result<Task> {
    let mut tasks = store.read_tasks()?;
    let pos = model::position_by_id(&tasks, id, "Task", |t: &Task| t.id.as_str())?;
    let removed = tasks.remove(pos);
    store.write_tasks(&tasks)?;
    info!(id = %removed.id, title = %removed.title, "task deleted");
    Ok(removed)
}

pub fn update_step(store: &Store, id: &str, step_id: usize, completed: bool, today: NaiveDate) -> Result<Task> {
    let task = modify_task(store, id, |task| task.update_step(step_id, completed, today))?;
    info!(id = %task.id, step = step_id, completed, status = %task.status, "step updated");
    Ok(task)
}

/// Steps of a task. A task without steps but with a `" - "` title gets one
/// derived from the title, saved right away so the next read sees it.
pub fn task_steps(store: &Store, id: &str) -> Result<(Task, Vec<Step>)> {
    let mut tasks = store.read_tasks()?;
    let pos = model::position_by_id(&tasks, id, "Task", |t: &Task| t.id.as_str())?;
    if tasks[pos].derive_steps() {
        store.write_tasks(&tasks)?;
        info!(id = %tasks[pos].id, "step derived from title");
    }
    let task = tasks.swap_remove(pos);
    let steps = derive::parse_steps(&task.steps);
    Ok((task, steps))
}

pub fn task_progress(store: &Store, id: &str) -> Result<Progress> {
    let (_, steps) = task_steps(store, id)?;
    Ok(derive::progress(&steps))
}

fn validate_hours(field: &'static str, hours: f64) -> Result<f64> {
    if hours.is_finite() {
        Ok(hours)
    } else {
        Err(TrackerError::InvalidInput {
            field,
            reason: "must be a finite number".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn setup_store() -> (Store, TempDir) {
        let dir = tempdir().expect("Failed to create temp directory for test store");
        let store = Store::open(dir.path()).expect("Failed to open test store");
        (store, dir)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 6).unwrap()
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 10, 6, 9, 30, 0).unwrap()
    }

    fn new_task(title: &str, estimated_hours: f64, steps: &[&str]) -> NewTask {
        NewTask {
            title: title.to_string(),
            due_date: today() + Duration::days(7),
            estimated_hours,
            priority: Priority::Medium,
            steps: steps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_add_task_defaults() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("  Read Chapter 3 ", 2.0, &["Skim", "Notes"]), now()).unwrap();
        assert_eq!(task.title, "Read Chapter 3");
        assert_eq!(task.status, Status::Todo);
        assert_eq!(task.hours_logged, 0.0);
        assert_eq!(task.steps, "- Skim\n- Notes");
        assert!(task.created_at.starts_with("2025-10-06T09:30:00.000000"));
        assert_eq!(store.read_tasks().unwrap(), vec![task]);
    }

    #[test]
    fn test_add_task_rejects_blank_title() {
        let (store, _dir) = setup_store();
        let err = add_task(&store, new_task("   ", 1.0, &[]), now()).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidInput { field: "title", .. }));
        assert!(store.read_tasks().unwrap().is_empty());
    }

    #[test]
    fn test_done_auto_logs_estimate() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Essay", 3.0, &[]), now()).unwrap();
        let done = set_status(&store, &task.id, Status::Done, today()).unwrap();
        assert_eq!(done.completed_at, "2025-10-06");
        assert_eq!(done.hours_logged, 3.0);
        assert_eq!(done.estimated_hours, 3.0);
    }

    #[test]
    fn test_done_without_estimate_defaults_to_one_hour() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Essay", 0.0, &[]), now()).unwrap();
        let done = set_status(&store, &task.id, Status::Done, today()).unwrap();
        assert_eq!(done.estimated_hours, 1.0);
        assert_eq!(done.hours_logged, 1.0);
    }

    #[test]
    fn test_done_keeps_logged_hours() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Essay", 3.0, &[]), now()).unwrap();
        log_hours(&store, &task.id, 1.25).unwrap();
        let done = set_status(&store, &task.id, Status::Done, today()).unwrap();
        assert_eq!(done.hours_logged, 1.25);
    }

    #[test]
    fn test_reopen_clears_completion_date() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Essay", 3.0, &[]), now()).unwrap();
        set_status(&store, &task.id, Status::Done, today()).unwrap();
        let reopened = set_status(&store, &task.id, Status::Todo, today()).unwrap();
        assert_eq!(reopened.completed_at, "");
        assert_eq!(reopened.hours_logged, 3.0);
    }

    #[test]
    fn test_reopen_unticks_last_step() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Lab", 2.0, &["Setup", "Run"]), now()).unwrap();
        update_step(&store, &task.id, 0, true, today()).unwrap();
        update_step(&store, &task.id, 1, true, today()).unwrap();

        let reopened = set_status(&store, &task.id, Status::Todo, today()).unwrap();
        assert_eq!(reopened.status, Status::Todo);
        assert_eq!(reopened.steps, "✓ Setup\n- Run");
        assert_eq!(store.read_tasks().unwrap(), vec![reopened.clone()]);

        let done = update_step(&store, &task.id, 1, true, today()).unwrap();
        assert_eq!(done.status, Status::Done);
    }

    #[test]
    fn test_reopen_keeps_partial_steps() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Lab", 2.0, &["Setup", "Run"]), now()).unwrap();
        update_step(&store, &task.id, 0, true, today()).unwrap();
        set_status(&store, &task.id, Status::Done, today()).unwrap();
        let reopened = set_status(&store, &task.id, Status::Todo, today()).unwrap();
        assert_eq!(reopened.steps, "✓ Setup\n- Run");
    }

    #[test]
    fn test_log_hours_never_negative() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Essay", 3.0, &[]), now()).unwrap();
        assert_eq!(log_hours(&store, &task.id, 2.0).unwrap().hours_logged, 2.0);
        assert_eq!(log_hours(&store, &task.id, -5.0).unwrap().hours_logged, 0.0);
        assert!(log_hours(&store, &task.id, f64::NAN).is_err());
    }

    #[test]
    fn test_set_estimate_and_due_date() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Essay", 3.0, &[]), now()).unwrap();
        assert_eq!(set_estimate(&store, &task.id, -1.0).unwrap().estimated_hours, 0.0);
        let due = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert_eq!(set_due_date(&store, &task.id, due).unwrap().due_date, "2025-12-01");
    }

    #[test]
    fn test_set_completed_at() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Essay", 3.0, &[]), now()).unwrap();
        assert!(set_completed_at(&store, &task.id, "2025-10-01").is_err());

        set_status(&store, &task.id, Status::Done, today()).unwrap();
        let edited = set_completed_at(&store, &task.id, "2025-10-01T18:00:00-04:00").unwrap();
        assert_eq!(edited.completed_at, "2025-10-01");
        let edited = set_completed_at(&store, &task.id, "01/10/2025 late").unwrap();
        assert_eq!(edited.completed_at, "01/10/2025");
        assert_eq!(set_completed_at(&store, &task.id, "").unwrap().completed_at, "");
    }

    #[test]
    fn test_delete_task() {
        let (store, _dir) = setup_store();
        let keep = add_task(&store, new_task("Keep", 1.0, &[]), now()).unwrap();
        let gone = add_task(&store, new_task("Gone", 1.0, &[]), now()).unwrap();
        delete_task(&store, &gone.id).unwrap();
        assert_eq!(store.read_tasks().unwrap(), vec![keep]);
        assert!(matches!(delete_task(&store, &gone.id), Err(TrackerError::NotFound { .. })));
    }

    #[test]
    fn test_last_step_completes_task() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Lab", 2.0, &["Setup", "Run"]), now()).unwrap();

        let partial = update_step(&store, &task.id, 0, true, today()).unwrap();
        assert_eq!(partial.status, Status::Todo);
        assert_eq!(partial.steps, "✓ Setup\n- Run");

        let done = update_step(&store, &task.id, 1, true, today()).unwrap();
        assert_eq!(done.status, Status::Done);
        assert_eq!(done.completed_at, "2025-10-06");
        assert_eq!(done.hours_logged, 2.0);

        let unticked = update_step(&store, &task.id, 1, false, today()).unwrap();
        assert_eq!(unticked.status, Status::Done);
        assert_eq!(unticked.steps, "✓ Setup\n- Run");
    }

    #[test]
    fn test_unknown_step_writes_nothing() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Lab", 2.0, &["Setup"]), now()).unwrap();
        let before = fs::read(store.tasks_path()).unwrap();
        let err = update_step(&store, &task.id, 7, true, today()).unwrap_err();
        assert!(matches!(err, TrackerError::StepNotFound { step: 7, .. }));
        assert_eq!(fs::read(store.tasks_path()).unwrap(), before);
    }

    #[test]
    fn test_steps_derived_from_title_are_persisted() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Cloud Computing - Draft slides", 2.0, &[]), now()).unwrap();

        let (_, steps) = task_steps(&store, &task.id).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].description, "Draft slides");
        assert_eq!(store.read_tasks().unwrap()[0].steps, "- Draft slides");

        let (_, again) = task_steps(&store, &task.id).unwrap();
        assert_eq!(again, steps);
    }

    #[test]
    fn test_no_steps_without_separator() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Read Chapter 3", 2.0, &[]), now()).unwrap();
        let (_, steps) = task_steps(&store, &task.id).unwrap();
        assert!(steps.is_empty());
        assert_eq!(task_progress(&store, &task.id).unwrap().percentage, 0.0);
    }

    #[test]
    fn test_progress_counts_ticked_steps() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Lab", 2.0, &["a", "b", "c", "d"]), now()).unwrap();
        update_step(&store, &task.id, 2, true, today()).unwrap();
        let progress = task_progress(&store, &task.id).unwrap();
        assert_eq!((progress.completed, progress.total), (1, 4));
        assert_eq!(progress.percentage, 25.0);
    }

    #[test]
    fn test_commands_accept_id_prefix() {
        let (store, _dir) = setup_store();
        let task = add_task(&store, new_task("Essay", 3.0, &[]), now()).unwrap();
        let logged = log_hours(&store, &task.id[..8], 1.0).unwrap();
        assert_eq!(logged.id, task.id);
    }
}
