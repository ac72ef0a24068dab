use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the store and the task/timetable operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("No rows parsed")]
    NoRowsParsed,

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} id '{id}' is ambiguous")]
    AmbiguousId { entity: &'static str, id: String },

    #[error("Step {step} not found in task '{task}'")]
    StepNotFound { task: String, step: usize },

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// What a command reports back to the user. The presentation layer decides
/// what to do with it; nothing here is kept between commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub ok: bool,
    pub message: String,
}

impl Outcome {
    pub fn success<S: Into<String>>(message: S) -> Outcome {
        Outcome { ok: true, message: message.into() }
    }

    pub fn failure<S: Into<String>>(message: S) -> Outcome {
        Outcome { ok: false, message: message.into() }
    }
}

impl<T: std::fmt::Display> From<Result<T>> for Outcome {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::success(value.to_string()),
            Err(e) => Outcome::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_lists_every_name() {
        let e = TrackerError::MissingColumns(vec!["priority".into(), "status".into()]);
        assert_eq!(e.to_string(), "Missing required columns: priority, status");
    }

    #[test]
    fn test_outcome_from_error_is_not_ok() {
        let result: Result<String> = Err(TrackerError::NoRowsParsed);
        let outcome = Outcome::from(result);
        assert!(!outcome.ok);
        assert_eq!(outcome.message, "No rows parsed");
    }

    #[test]
    fn test_outcome_from_value_is_ok() {
        let outcome = Outcome::from(Ok::<_, TrackerError>("Imported 3 items."));
        assert!(outcome.ok);
        assert_eq!(outcome.message, "Imported 3 items.");
    }
}
