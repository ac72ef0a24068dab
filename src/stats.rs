use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::derive;
use crate::model::{Status, Task};

/// Headline numbers of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kpis {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub overdue: usize,
    pub completion_percentage: f64,
}

pub fn kpis(tasks: &[Task], today: NaiveDate) -> Kpis {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.is_done()).count();
    let overdue = tasks.iter().filter(|t| t.is_overdue(today)).count();
    Kpis {
        total,
        completed,
        remaining: total - completed,
        overdue,
        completion_percentage: percentage(completed as f64, total as f64),
    }
}

/// Tasks with logged time and the totals against the estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedSummary<'a> {
    pub tasks: Vec<&'a Task>,
    pub total_logged: f64,
    pub total_estimated: f64,
    pub progress_percentage: f64,
}

pub fn logged_summary(tasks: &[Task]) -> LoggedSummary<'_> {
    let mut logged: Vec<&Task> = tasks.iter().filter(|t| t.hours_logged > 0.0).collect();
    logged.sort_by(|a, b| b.hours_logged.total_cmp(&a.hours_logged));

    let total_logged: f64 = logged.iter().map(|t| t.hours_logged).sum();
    let total_estimated: f64 = tasks.iter().map(|t| t.estimated_hours).sum();
    LoggedSummary {
        tasks: logged,
        total_logged,
        total_estimated,
        progress_percentage: percentage(total_logged, total_estimated),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub todo: usize,
    pub done: usize,
}

/// Todo and done counts per category, in category order.
pub fn category_status(tasks: &[Task]) -> BTreeMap<String, StatusCounts> {
    let mut counts: BTreeMap<String, StatusCounts> = BTreeMap::new();
    for task in tasks {
        let entry = counts.entry(derive::category(&task.title)).or_default();
        match task.status {
            Status::Todo => entry.todo += 1,
            Status::Done => entry.done += 1,
        }
    }
    counts
}

/// Hours logged per category, categories without hours left out, largest
/// first.
pub fn category_hours(tasks: &[Task]) -> Vec<(String, f64)> {
    let mut hours: BTreeMap<String, f64> = BTreeMap::new();
    for task in tasks {
        *hours.entry(derive::category(&task.title)).or_insert(0.0) += task.hours_logged;
    }
    let mut hours: Vec<(String, f64)> = hours.into_iter().filter(|(_, h)| *h > 0.0).collect();
    hours.sort_by(|a, b| b.1.total_cmp(&a.1));
    hours
}

/// Hours logged grouped by the day each task was created, to one decimal.
pub fn hours_per_day(tasks: &[Task]) -> Vec<(NaiveDate, f64)> {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for task in tasks {
        if let Some(day) = task.created_on() {
            *days.entry(day).or_insert(0.0) += task.hours_logged;
        }
    }
    days.into_iter()
        .map(|(day, hours)| (day, (hours * 10.0).round() / 10.0))
        .collect()
}

/// Open tasks, earliest due date first. Tasks without a readable date go
/// last.
pub fn upcoming(tasks: &[Task]) -> Vec<&Task> {
    let mut open: Vec<&Task> = tasks.iter().filter(|t| !t.is_done()).collect();
    open.sort_by_key(|t| {
        let due = t.due();
        (due.is_none(), due)
    });
    open
}

/// Tasks grouped by category, keeping the order in which categories first
/// appear in the table.
pub fn by_category<'a, I>(tasks: I) -> Vec<(String, Vec<&'a Task>)>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut groups: Vec<(String, Vec<&Task>)> = Vec::new();
    for task in tasks {
        let category = derive::category(&task.title);
        match groups.iter_mut().find(|(name, _)| *name == category) {
            Some((_, members)) => members.push(task),
            None => groups.push((category, vec![task])),
        }
    }
    groups
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}
