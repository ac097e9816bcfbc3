use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column order of the CSV file and of every entry's field list.
pub const CSV_HEADERS: [&str; 6] = ["Email", "Student ID", "Week", "Exercise", "Status", "Feedback"];

/// Body fields a `POST /log` must carry, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 6] = ["email", "student_id", "week", "exercise", "status", "feedback"];

/// A validated entry that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub email: String,
    pub student_id: String,
    pub week: String,
    pub exercise: String,
    pub status: String,
    pub feedback: String,
}

/// One student's status record for a given week/exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub email: String,
    pub student_id: String,
    pub week: String,
    pub exercise: String,
    pub status: String,
    pub feedback: String,
    /// Assigned by the store. Flat-file storage does not keep it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewEntry {
    /// Lowercases and trims the indexed fields (email, week) and trims the
    /// student id, which stays case-sensitive.
    pub fn normalized(&self) -> NewEntry {
        NewEntry {
            email: normalize_ci(&self.email),
            student_id: normalize_id(&self.student_id),
            week: normalize_ci(&self.week),
            exercise: self.exercise.clone(),
            status: self.status.clone(),
            feedback: self.feedback.clone(),
        }
    }

    /// Converts into a stored entry without a timestamp.
    pub fn into_entry(self) -> ProgressEntry {
        ProgressEntry {
            email: self.email,
            student_id: self.student_id,
            week: self.week,
            exercise: self.exercise,
            status: self.status,
            feedback: self.feedback,
            created_at: None,
        }
    }

    /// Converts into a stored entry stamped with `at`.
    pub fn stamped(self, at: DateTime<Utc>) -> ProgressEntry {
        let mut entry = self.into_entry();
        entry.created_at = Some(at);
        entry
    }
}

impl ProgressEntry {
    /// Field values in `CSV_HEADERS` order.
    pub fn to_record(&self) -> [&str; 6] {
        [
            &self.email,
            &self.student_id,
            &self.week,
            &self.exercise,
            &self.status,
            &self.feedback,
        ]
    }

    /// Builds an entry from a CSV row. Short rows are padded with empty
    /// strings, extra columns are ignored.
    pub fn from_record<'a, I>(record: I) -> ProgressEntry
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fields = record.into_iter().map(str::to_string);
        let mut next = || fields.next().unwrap_or_default();
        ProgressEntry {
            email: next(),
            student_id: next(),
            week: next(),
            exercise: next(),
            status: next(),
            feedback: next(),
            created_at: None,
        }
    }
}

/// Recognized values of the `status` field. Anything else is accepted but
/// logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Completed,
    InProgress,
    NotStarted,
    Submitted,
    Reviewed,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Completed,
        Status::InProgress,
        Status::NotStarted,
        Status::Submitted,
        Status::Reviewed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Completed => "completed",
            Status::InProgress => "in_progress",
            Status::NotStarted => "not_started",
            Status::Submitted => "submitted",
            Status::Reviewed => "reviewed",
        }
    }

    /// Case-insensitive lookup.
    pub fn parse(value: &str) -> Option<Status> {
        let lower = value.to_lowercase();
        Status::ALL.into_iter().find(|s| s.as_str() == lower)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalization for case-insensitive fields.
pub fn normalize_ci(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Normalization for the student id.
pub fn normalize_id(value: &str) -> String {
    value.trim().to_string()
}
