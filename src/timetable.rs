use chrono::{NaiveTime, Weekday};
use tracing::info;

use crate::error::{Result, TrackerError};
use crate::model::{self, TimetableEntry};
use crate::store::Store;

/// A sample week, loaded by `seed` when no sheet is given.
const EXAMPLE_WEEK: &[(Weekday, &str, &str, &str, &str)] = &[
    (Weekday::Mon, "07:00", "08:00", "Gym + Morning Routine + Breakfast", "Personal well-being"),
    (Weekday::Mon, "08:00", "09:00", "Gym + Morning Routine + Breakfast", "Personal well-being"),
    (Weekday::Mon, "10:30", "11:30", "School Project", "Data Product Design & Taskconnect"),
    (Weekday::Mon, "11:30", "12:30", "Break", ""),
    (Weekday::Mon, "12:30", "13:30", "School Work", "Cloud Computing"),
    (Weekday::Mon, "13:30", "15:00", "Lunch", ""),
    (Weekday::Mon, "15:00", "20:00", "Lecture", ""),
    (Weekday::Tue, "07:00", "08:00", "Morning Routine + Breakfast", "Personal well-being"),
    (Weekday::Tue, "08:00", "09:00", "Morning Routine + Breakfast", "Personal well-being"),
    (Weekday::Tue, "09:00", "15:00", "Lectures & Commute", ""),
    (Weekday::Tue, "15:00", "20:00", "Day End", "Half-Day Off"),
    (Weekday::Wed, "07:00", "08:00", "Gym", "Personal well-being"),
    (Weekday::Wed, "08:00", "10:30", "Morning Routine + Breakfast", "Personal well-being"),
    (Weekday::Wed, "10:30", "11:30", "School Project Deep Work", "Data Product Design or Driving License"),
    (Weekday::Wed, "11:30", "12:30", "Break", ""),
    (Weekday::Wed, "12:30", "13:30", "School Project Deep Work", "Cloud Computing"),
    (Weekday::Wed, "13:30", "14:30", "Lunch", ""),
    (Weekday::Wed, "14:30", "15:30", "Assignments", "Computational Maths Assignment"),
    (Weekday::Wed, "15:30", "16:30", "Break", ""),
    (Weekday::Wed, "16:30", "17:30", "Personal Projects", "TaskConnect"),
    (Weekday::Wed, "17:30", "18:30", "Dinner / Relax", ""),
    (Weekday::Wed, "18:30", "19:30", "Tutorials", "AWS Cloud Practitioner"),
    (Weekday::Wed, "19:30", "20:30", "Break", ""),
    (Weekday::Thu, "07:00", "08:00", "Gym", "Personal well-being"),
    (Weekday::Thu, "08:00", "10:30", "Morning Routine + Breakfast", "Personal well-being"),
    (Weekday::Thu, "10:30", "11:30", "School Project Deep Work", "Cloud Computing"),
    (Weekday::Thu, "11:30", "12:30", "Break", ""),
    (Weekday::Thu, "12:30", "13:30", "Personal Projects", "Fraud Detection"),
    (Weekday::Thu, "13:30", "14:30", "Lunch", ""),
    (Weekday::Thu, "14:30", "15:30", "Assignments", "Computational Maths Lab"),
    (Weekday::Thu, "15:30", "16:30", "Break", ""),
    (Weekday::Thu, "16:30", "17:30", "Personal Projects", "TaskConnect"),
    (Weekday::Thu, "17:30", "18:30", "Dinner / Relax", ""),
    (Weekday::Thu, "18:30", "19:30", "Tutorials", "Harvard Data Science"),
    (Weekday::Thu, "19:30", "20:30", "Break", ""),
    (Weekday::Fri, "07:00", "08:00", "Gym", "Personal well-being"),
    (Weekday::Fri, "08:00", "10:30", "Morning Routine + Breakfast", "Personal well-being"),
    (Weekday::Fri, "10:30", "11:30", "School Work", "Computational Maths"),
    (Weekday::Fri, "11:30", "12:30", "Break", ""),
    (Weekday::Fri, "12:30", "13:30", "School Project Deep Work", "Data Product Design"),
    (Weekday::Fri, "13:30", "14:30", "Lunch", ""),
    (Weekday::Fri, "14:30", "15:30", "Assignments", "Cloud Computing"),
    (Weekday::Fri, "15:30", "16:30", "Break", ""),
    (Weekday::Fri, "16:30", "17:30", "Personal Projects", "TaskConnect"),
    (Weekday::Fri, "17:30", "18:30", "Dinner / Relax", ""),
    (Weekday::Fri, "18:30", "19:30", "Tutorials", "Harvard Data Science"),
    (Weekday::Fri, "19:30", "20:30", "Break", ""),
    (Weekday::Sat, "07:00", "08:00", "Gym", "Personal well-being"),
    (Weekday::Sat, "08:00", "10:30", "Morning Routine + Breakfast", "Personal well-being"),
    (Weekday::Sat, "10:30", "11:30", "Personal Project Deep Work", "TaskConnect"),
    (Weekday::Sat, "11:30", "12:30", "Break", ""),
    (Weekday::Sat, "12:30", "13:30", "Personal Project Deep Work", "Fraud Detection"),
    (Weekday::Sat, "13:30", "20:00", "Day End", "Half-Day Off"),
    (Weekday::Sun, "07:00", "08:00", "Morning Routine + Breakfast", "Personal well-being"),
    (Weekday::Sun, "08:00", "10:30", "Morning Routine + Breakfast", "Personal well-being"),
    (Weekday::Sun, "10:30", "11:30", "Weekly Review", "Assess Progress"),
    (Weekday::Sun, "11:30", "12:30", "Break", ""),
    (Weekday::Sun, "12:30", "13:30", "Tutorials", "Harvard Data Science"),
    (Weekday::Sun, "13:30", "14:30", "Lunch", ""),
    (Weekday::Sun, "14:30", "15:30", "Catch-up / Flex Time", "Unfinished labs or projects"),
    (Weekday::Sun, "15:30", "16:30", "Break", ""),
    (Weekday::Sun, "16:30", "17:30", "Catch-up / Flex Time", "Unfinished labs or projects"),
    (Weekday::Sun, "17:30", "18:30", "Dinner / Relax", ""),
    (Weekday::Sun, "18:30", "19:30", "Prep Next Week", "Set goals"),
    (Weekday::Sun, "19:30", "20:30", "Break", ""),
];

/// Fields of a timetable slot; `None` leaves a field untouched on update.
#[derive(Debug, Clone, Default)]
pub struct EntryFields {
    pub day: Option<Weekday>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub activity: Option<String>,
    pub focus: Option<String>,
}

/// Validate time format (HH:MM, 24-hour format).
pub fn validate_time(field: &'static str, time: &str) -> Result<String> {
    let time = time.trim();
    let err = |reason: &str| TrackerError::InvalidInput {
        field,
        reason: format!("'{}' {}", time, reason),
    };
    if time.len() != 5 || time.as_bytes()[2] != b':' {
        return Err(err("must be in HH:MM format"));
    }
    NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| err("is not a valid time"))?;
    Ok(time.to_string())
}

fn validate_activity(activity: &str) -> Result<String> {
    let activity = activity.trim();
    if activity.is_empty() {
        return Err(TrackerError::InvalidInput {
            field: "activity",
            reason: "cannot be empty".into(),
        });
    }
    Ok(activity.to_string())
}

pub fn add_entry(
    store: &Store,
    day: Weekday,
    start_time: &str,
    end_time: &str,
    activity: &str,
    focus: &str,
) -> Result<TimetableEntry> {
    let entry = TimetableEntry {
        id: model::generate_id(),
        day,
        start_time: validate_time("start_time", start_time)?,
        end_time: validate_time("end_time", end_time)?,
        activity: validate_activity(activity)?,
        focus: focus.trim().to_string(),
    };
    let mut entries = store.read_timetable()?;
    entries.push(entry.clone());
    store.write_timetable(&entries)?;
    info!(id = %entry.id, day = model::weekday_name(day), "timetable entry added");
    Ok(entry)
}

pub fn update_entry(store: &Store, id: &str, fields: EntryFields) -> Result<TimetableEntry> {
    let mut entries = store.read_timetable()?;
    let pos = model::position_by_id(&entries, id, "Timetable entry", |e: &TimetableEntry| e.id.as_str())?;

    let mut entry = entries[pos].clone();
    if let Some(day) = fields.day {
        entry.day = day;
    }
    if let Some(start) = fields.start_time {
        entry.start_time = validate_time("start_time", &start)?;
    }
    if let Some(end) = fields.end_time {
        entry.end_time = validate_time("end_time", &end)?;
    }
    if let Some(activity) = fields.activity {
        entry.activity = validate_activity(&activity)?;
    }
    if let Some(focus) = fields.focus {
        entry.focus = focus.trim().to_string();
    }

    entries[pos] = entry.clone();
    store.write_timetable(&entries)?;
    info!(id = %entry.id, "timetable entry updated");
    Ok(entry)
}

pub fn delete_entry(store: &Store, id: &str) -> Result<TimetableEntry> {
    let mut entries = store.read_timetable()?;
    let pos = model::position_by_id(&entries, id, "Timetable entry", |e: &TimetableEntry| e.id.as_str())?;
    let removed = entries.remove(pos);
    store.write_timetable(&entries)?;
    info!(id = %removed.id, "timetable entry deleted");
    Ok(removed)
}

/// Replace the timetable with the sample week.
pub fn seed_example(store: &Store) -> Result<Vec<TimetableEntry>> {
    let entries: Vec<TimetableEntry> = EXAMPLE_WEEK
        .iter()
        .map(|&(day, start_time, end_time, activity, focus)| TimetableEntry {
            id: model::generate_id(),
            day,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            activity: activity.to_string(),
            focus: focus.to_string(),
        })
        .collect();
    store.write_timetable(&entries)?;
    info!(added = entries.len(), "example timetable seeded");
    Ok(entries)
}

/// The week ordered Monday first, then by start time.
pub fn weekly(entries: &[TimetableEntry]) -> Vec<TimetableEntry> {
    let mut week = entries.to_vec();
    week.sort_by(|a, b| {
        a.day
            .num_days_from_monday()
            .cmp(&b.day.num_days_from_monday())
            .then_with(|| a.start_time.cmp(&b.start_time))
    });
    week
}

/// Entries of a single day, ordered by start time.
pub fn for_day(entries: &[TimetableEntry], day: Weekday) -> Vec<TimetableEntry> {
    weekly(entries).into_iter().filter(|e| e.day == day).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn setup_store() -> (Store, TempDir) {
        let dir = tempdir().expect("Failed to create temp directory for test store");
        let store = Store::open(dir.path()).expect("Failed to open test store");
        (store, dir)
    }

    #[test]
    fn test_validate_time() {
        assert_eq!(validate_time("start_time", " 07:00 ").unwrap(), "07:00");
        assert!(validate_time("start_time", "7:00").is_err());
        assert!(validate_time("start_time", "24:00").is_err());
        assert!(validate_time("start_time", "12:60").is_err());
        assert!(validate_time("start_time", "12-30").is_err());
    }

    #[test]
    fn test_add_and_list_by_day() {
        let (store, _dir) = setup_store();
        add_entry(&store, Weekday::Tue, "09:00", "15:00", "Lectures & Commute", "").unwrap();
        add_entry(&store, Weekday::Mon, "10:30", "11:30", "School Project", "Data Product Design").unwrap();
        add_entry(&store, Weekday::Mon, "07:00", "08:00", "Gym", "Personal well-being").unwrap();

        let entries = store.read_timetable().unwrap();
        let week: Vec<String> = weekly(&entries).into_iter().map(|e| e.activity).collect();
        assert_eq!(week, vec!["Gym", "School Project", "Lectures & Commute"]);

        let monday = for_day(&entries, Weekday::Mon);
        assert_eq!(monday.len(), 2);
        assert!(for_day(&entries, Weekday::Sun).is_empty());
    }

    #[test]
    fn test_add_rejects_blank_activity() {
        let (store, _dir) = setup_store();
        assert!(add_entry(&store, Weekday::Mon, "07:00", "08:00", "  ", "").is_err());
        assert!(store.read_timetable().unwrap().is_empty());
    }

    #[test]
    fn test_update_entry_changes_only_given_fields() {
        let (store, _dir) = setup_store();
        let entry = add_entry(&store, Weekday::Wed, "18:30", "19:30", "Tutorials", "AWS").unwrap();
        let fields = EntryFields {
            day: Some(Weekday::Thu),
            focus: Some("Data Science".into()),
            ..EntryFields::default()
        };
        let updated = update_entry(&store, &entry.id, fields).unwrap();
        assert_eq!(updated.day, Weekday::Thu);
        assert_eq!(updated.start_time, "18:30");
        assert_eq!(updated.focus, "Data Science");
        assert_eq!(store.read_timetable().unwrap(), vec![updated]);
    }

    #[test]
    fn test_update_with_bad_time_writes_nothing() {
        let (store, _dir) = setup_store();
        let entry = add_entry(&store, Weekday::Wed, "18:30", "19:30", "Tutorials", "").unwrap();
        let fields = EntryFields { end_time: Some("7pm".into()), ..EntryFields::default() };
        assert!(update_entry(&store, &entry.id, fields).is_err());
        assert_eq!(store.read_timetable().unwrap(), vec![entry]);
    }

    #[test]
    fn test_seed_example_replaces_timetable() {
        let (store, _dir) = setup_store();
        add_entry(&store, Weekday::Mon, "06:00", "07:00", "Old slot", "").unwrap();

        let seeded = seed_example(&store).unwrap();
        let entries = store.read_timetable().unwrap();
        assert_eq!(entries, seeded);
        assert!(entries.iter().all(|e| e.activity != "Old slot"));

        let sunday = for_day(&entries, Weekday::Sun);
        assert_eq!(sunday.len(), 12);
        assert_eq!(sunday[0].start_time, "07:00");
        for entry in &entries {
            validate_time("start_time", &entry.start_time).unwrap();
            validate_time("end_time", &entry.end_time).unwrap();
        }
    }

    #[test]
    fn test_delete_entry() {
        let (store, _dir) = setup_store();
        let entry = add_entry(&store, Weekday::Sun, "10:30", "11:30", "Weekly Review", "Assess Progress").unwrap();
        delete_entry(&store, &entry.id).unwrap();
        assert!(store.read_timetable().unwrap().is_empty());
    }
}
