//! Maintenance case model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{normalize_text_option, now_millis};

use super::key::RecordKey;

/// Status given to cases created without an explicit one.
pub const DEFAULT_CASE_STATUS: &str = "open";

/// A maintenance case as stored on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Server id once synced, local id before that
    pub key: RecordKey,
    pub title: String,
    pub client_name: String,
    pub client_phone: String,
    pub device_type: String,
    pub device_model: String,
    pub serial_number: Option<String>,
    /// Workflow status (e.g. `open`, `in_progress`, `closed`)
    pub status: String,
    pub priority: Option<String>,
    pub issue_description: String,
    pub diagnosis: Option<String>,
    pub solution: Option<String>,
    pub case_number: Option<String>,
    pub technician_name: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Local mutations not yet acknowledged by the server
    pub needs_sync: bool,
    /// Message from the last failed sync attempt
    pub sync_error: Option<String>,
    /// Local edit counter, bumped by every `apply`
    #[serde(default)]
    pub revision: i64,
}

/// Input for creating a case offline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCase {
    pub title: String,
    pub client_name: String,
    pub client_phone: String,
    pub device_type: String,
    pub device_model: String,
    pub serial_number: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub issue_description: String,
    pub case_number: Option<String>,
    pub technician_name: Option<String>,
}

/// Partial update of a case; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseUpdate {
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub device_type: Option<String>,
    pub device_model: Option<String>,
    pub serial_number: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub issue_description: Option<String>,
    pub diagnosis: Option<String>,
    pub solution: Option<String>,
    pub technician_name: Option<String>,
}

impl CaseRecord {
    /// Build a dirty, locally-keyed case from user input.
    pub fn new_local(input: NewCase) -> Result<Self> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput("Case title cannot be empty".to_string()));
        }

        let now = now_millis();
        Ok(Self {
            key: RecordKey::new_local(),
            title,
            client_name: input.client_name.trim().to_string(),
            client_phone: input.client_phone.trim().to_string(),
            device_type: input.device_type.trim().to_string(),
            device_model: input.device_model.trim().to_string(),
            serial_number: normalize_text_option(input.serial_number),
            status: normalize_text_option(input.status)
                .unwrap_or_else(|| DEFAULT_CASE_STATUS.to_string()),
            priority: normalize_text_option(input.priority),
            issue_description: input.issue_description.trim().to_string(),
            diagnosis: None,
            solution: None,
            case_number: normalize_text_option(input.case_number),
            technician_name: normalize_text_option(input.technician_name),
            created_at: now,
            updated_at: now,
            needs_sync: true,
            sync_error: None,
            revision: 0,
        })
    }

    /// Apply a partial update, bump `updated_at` and `revision`, and mark the case dirty.
    pub fn apply(&mut self, update: CaseUpdate) -> Result<()> {
        if let Some(title) = update.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(Error::InvalidInput("Case title cannot be empty".to_string()));
            }
            self.title = title;
        }
        if let Some(value) = update.client_name {
            self.client_name = value;
        }
        if let Some(value) = update.client_phone {
            self.client_phone = value;
        }
        if let Some(value) = update.device_type {
            self.device_type = value;
        }
        if let Some(value) = update.device_model {
            self.device_model = value;
        }
        if let Some(value) = update.status {
            self.status = value;
        }
        if let Some(value) = update.issue_description {
            self.issue_description = value;
        }
        if update.serial_number.is_some() {
            self.serial_number = normalize_text_option(update.serial_number);
        }
        if update.priority.is_some() {
            self.priority = normalize_text_option(update.priority);
        }
        if update.diagnosis.is_some() {
            self.diagnosis = normalize_text_option(update.diagnosis);
        }
        if update.solution.is_some() {
            self.solution = normalize_text_option(update.solution);
        }
        if update.technician_name.is_some() {
            self.technician_name = normalize_text_option(update.technician_name);
        }

        self.updated_at = now_millis().max(self.updated_at + 1);
        self.revision += 1;
        self.needs_sync = true;
        Ok(())
    }

    /// Short human label used in sync error messages and CLI output.
    #[must_use]
    pub fn label(&self) -> String {
        format!("case {} ({})", self.key, self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewCase {
        NewCase {
            title: "  Broken screen ".to_string(),
            client_name: "Dana".to_string(),
            client_phone: "555-0100".to_string(),
            device_type: "Laptop".to_string(),
            device_model: "X1".to_string(),
            issue_description: "Cracked panel".to_string(),
            ..NewCase::default()
        }
    }

    #[test]
    fn test_new_local_case_is_dirty_and_local() {
        let case = CaseRecord::new_local(sample()).unwrap();
        assert!(case.key.is_local());
        assert!(case.needs_sync);
        assert_eq!(case.title, "Broken screen");
        assert_eq!(case.status, DEFAULT_CASE_STATUS);
        assert_eq!(case.created_at, case.updated_at);
    }

    #[test]
    fn test_new_local_case_requires_title() {
        let input = NewCase {
            title: "   ".to_string(),
            ..sample()
        };
        assert!(CaseRecord::new_local(input).is_err());
    }

    #[test]
    fn test_apply_update_marks_dirty() {
        let mut case = CaseRecord::new_local(sample()).unwrap();
        case.needs_sync = false;

        case.apply(CaseUpdate {
            status: Some("closed".to_string()),
            solution: Some("Replaced panel".to_string()),
            ..CaseUpdate::default()
        })
        .unwrap();

        assert!(case.needs_sync);
        assert_eq!(case.revision, 1);
        assert_eq!(case.status, "closed");
        assert_eq!(case.solution.as_deref(), Some("Replaced panel"));
        assert_eq!(case.client_name, "Dana");
    }

    #[test]
    fn test_back_to_back_edits_are_distinguishable() {
        let mut case = CaseRecord::new_local(sample()).unwrap();
        let first = case.clone();

        case.apply(CaseUpdate::default()).unwrap();
        let second = case.clone();
        case.apply(CaseUpdate::default()).unwrap();

        assert!(second.updated_at > first.updated_at);
        assert!(case.updated_at > second.updated_at);
        assert_eq!(case.revision, 2);
    }

    #[test]
    fn test_apply_rejects_empty_title() {
        let mut case = CaseRecord::new_local(sample()).unwrap();
        let result = case.apply(CaseUpdate {
            title: Some(String::new()),
            ..CaseUpdate::default()
        });
        assert!(result.is_err());
    }
}
