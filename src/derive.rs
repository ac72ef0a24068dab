//! Values computed from task rows: categories, step lists, progress and the
//! risk ranking. Nothing in here touches the store.

use chrono::NaiveDate;

use crate::model::{Step, Task};

/// Label used when a title yields no category.
pub const UNCATEGORIZED: &str = "Uncategorized";

const TITLE_SEPARATOR: &str = " - ";
const DONE_MARK: char = '✓';
const PENDING_MARK: char = '-';

/// Extract the category encoded in a task title.
///
/// The first rule that applies wins:
/// 1. text before the first `" - "`,
/// 2. text before the first `(` when the title has both brackets,
/// 3. the first `/`-separated segment.
///
/// An empty result becomes [`UNCATEGORIZED`].
pub fn category(title: &str) -> String {
    let label = if let Some(pos) = title.find(TITLE_SEPARATOR) {
        &title[..pos]
    } else if title.contains('(') && title.contains(')') {
        title.split('(').next().unwrap_or("")
    } else {
        title.split('/').next().unwrap_or("")
    };

    let label = label.trim();
    if label.is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        label.to_string()
    }
}

/// The part of a title after the first `" - "`, if there is one.
pub fn title_suffix(title: &str) -> Option<&str> {
    title
        .find(TITLE_SEPARATOR)
        .map(|pos| title[pos + TITLE_SEPARATOR.len()..].trim())
}

/// Parse a step blob. Lines that are not steps are skipped but still count
/// for the positional ids.
pub fn parse_steps(blob: &str) -> Vec<Step> {
    blob.trim()
        .split('\n')
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.trim();
            let (completed, rest) = if let Some(rest) = line.strip_prefix(DONE_MARK) {
                (true, rest)
            } else if let Some(rest) = line.strip_prefix(PENDING_MARK) {
                (false, rest)
            } else {
                return None;
            };
            Some(Step {
                id: i,
                description: rest.trim().to_string(),
                completed,
                order: i,
            })
        })
        .collect()
}

/// Write steps back to the blob form, in step order.
pub fn format_steps(steps: &[Step]) -> String {
    let mut ordered: Vec<&Step> = steps.iter().collect();
    ordered.sort_by_key(|step| step.order);
    ordered
        .iter()
        .map(|step| {
            let mark = if step.completed { DONE_MARK } else { PENDING_MARK };
            format!("{} {}", mark, step.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build a blob from plain descriptions, all pending.
pub fn steps_blob<S: AsRef<str>>(descriptions: &[S]) -> String {
    let steps: Vec<Step> = descriptions
        .iter()
        .map(|d| d.as_ref().trim())
        .filter(|d| !d.is_empty())
        .enumerate()
        .map(|(i, description)| Step {
            id: i,
            description: description.to_string(),
            completed: false,
            order: i,
        })
        .collect();
    format_steps(&steps)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub percentage: f64,
}

pub fn progress(steps: &[Step]) -> Progress {
    let total = steps.len();
    let completed = steps.iter().filter(|s| s.completed).count();
    let percentage = if total > 0 {
        (completed as f64 / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };
    Progress { total, completed, percentage }
}

/// Risk of a single task: remaining hours over the hours available before
/// the due date. Infinite when no hours are available.
pub fn risk_score(remaining_hours: f64, days_until_due: i64, daily_capacity_hours: f64) -> f64 {
    let available = days_until_due.max(0) as f64 * daily_capacity_hours.max(0.0);
    if available == 0.0 {
        f64::INFINITY
    } else {
        remaining_hours.max(0.0) / available
    }
}

/// One line of the risk worklist.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskEntry {
    pub id: String,
    pub title: String,
    pub due_date: NaiveDate,
    pub remaining_hours: f64,
    pub risk: f64,
}

pub fn task_risk(task: &Task, today: NaiveDate, daily_capacity_hours: f64) -> Option<RiskEntry> {
    let due_date = task.due()?;
    let days_until_due = (due_date - today).num_days().max(0);
    let remaining_hours = task.remaining_hours();
    Some(RiskEntry {
        id: task.id.clone(),
        title: task.title.clone(),
        due_date,
        remaining_hours,
        risk: risk_score(remaining_hours, days_until_due, daily_capacity_hours),
    })
}

/// Rank tasks by descending risk, earliest due date first among equals.
/// Tasks whose due date does not read as a date cannot be ranked and are
/// left out.
pub fn rank_by_risk<'a, I>(tasks: I, today: NaiveDate, daily_capacity_hours: f64) -> Vec<RiskEntry>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut entries: Vec<RiskEntry> = tasks
        .into_iter()
        .filter_map(|task| task_risk(task, today, daily_capacity_hours))
        .collect();
    entries.sort_by(|a, b| b.risk.total_cmp(&a.risk).then(a.due_date.cmp(&b.due_date)));
    entries
}
