use crate::entry::{normalize_ci, normalize_id, ProgressEntry};

/// Equality filters for listing entries. Present filters are AND-ed.
///
/// Email and week compare case-insensitively, the student id compares
/// exactly after trimming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub week: Option<String>,
}

impl LogFilter {
    /// Builds a filter, treating empty strings as absent.
    pub fn new(email: Option<String>, student_id: Option<String>, week: Option<String>) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            email: keep(email),
            student_id: keep(student_id),
            week: keep(week),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.student_id.is_none() && self.week.is_none()
    }

    pub fn matches(&self, entry: &ProgressEntry) -> bool {
        if let Some(ref email) = self.email {
            if normalize_ci(&entry.email) != normalize_ci(email) {
                return false;
            }
        }
        if let Some(ref student_id) = self.student_id {
            if normalize_id(&entry.student_id) != normalize_id(student_id) {
                return false;
            }
        }
        if let Some(ref week) = self.week {
            if normalize_ci(&entry.week) != normalize_ci(week) {
                return false;
            }
        }
        true
    }

    /// Filter values as given by the caller, `null` where absent.
    pub fn applied(&self) -> serde_json::Value {
        serde_json::json!({
            "email": self.email,
            "student_id": self.student_id,
            "week": self.week,
        })
    }

    /// Keeps the entries matching this filter, preserving order.
    pub fn apply(&self, entries: Vec<ProgressEntry>) -> Vec<ProgressEntry> {
        if self.is_empty() {
            return entries;
        }
        entries.into_iter().filter(|e| self.matches(e)).collect()
    }
}
