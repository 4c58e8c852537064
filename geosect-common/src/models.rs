//! Domain models shared by the store, the spreadsheet codec and the HTTP API
//!
//! A [`Section`] exclusively owns its [`GeologicalClass`] entries; the
//! `New*` variants are the id-less forms used before the store assigns ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted geological class (owned by exactly one section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeologicalClass {
    pub id: i64,
    pub name: String,
    pub code: String,
}

/// Persisted section with its classes in stored order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub geological_classes: Vec<GeologicalClass>,
}

/// Geological class awaiting insertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGeologicalClass {
    pub name: String,
    pub code: String,
}

/// Section awaiting insertion (request bodies, decoded spreadsheet rows)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSection {
    pub name: String,
    #[serde(default)]
    pub geological_classes: Vec<NewGeologicalClass>,
}

impl NewGeologicalClass {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

impl NewSection {
    pub fn new(name: impl Into<String>, geological_classes: Vec<NewGeologicalClass>) -> Self {
        Self {
            name: name.into(),
            geological_classes,
        }
    }
}

impl Section {
    /// (name, code) pairs in stored order
    pub fn class_pairs(&self) -> Vec<(&str, &str)> {
        self.geological_classes
            .iter()
            .map(|c| (c.name.as_str(), c.code.as_str()))
            .collect()
    }

    /// True when at least one owned class carries `code`
    pub fn has_class_code(&self, code: &str) -> bool {
        self.geological_classes.iter().any(|c| c.code == code)
    }
}

/// Kind of background file job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobKind {
    Import,
    Export,
}

/// Job lifecycle: `IN_PROGRESS -> DONE | ERROR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    InProgress,
    Done,
    Error,
}

impl JobState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::InProgress => "IN_PROGRESS",
            JobState::Done => "DONE",
            JobState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Status record of one import or export job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Failure description, only set for `ERROR`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatus {
    /// Fresh `IN_PROGRESS` record with a random job id
    pub fn started(kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            kind,
            status: JobState::InProgress,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// Terminal `DONE` copy of this record
    pub fn done(&self) -> Self {
        Self {
            status: JobState::Done,
            updated_at: Utc::now(),
            error: None,
            ..self.clone()
        }
    }

    /// Terminal `ERROR` copy of this record
    pub fn failed(&self, error: impl Into<String>) -> Self {
        Self {
            status: JobState::Error,
            updated_at: Utc::now(),
            error: Some(error.into()),
            ..self.clone()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_serializes_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&JobState::InProgress).unwrap(), "\"IN_PROGRESS\"");
        assert_eq!(serde_json::to_string(&JobState::Done).unwrap(), "\"DONE\"");
        assert_eq!(serde_json::to_string(&JobState::Error).unwrap(), "\"ERROR\"");
        assert_eq!(JobState::InProgress.to_string(), "IN_PROGRESS");
    }

    #[test]
    fn test_started_job_has_unique_ids() {
        let a = JobStatus::started(JobKind::Import);
        let b = JobStatus::started(JobKind::Import);
        assert_ne!(a.job_id, b.job_id);
        assert_eq!(a.status, JobState::InProgress);
        assert!(!a.is_terminal());
    }

    #[test]
    fn test_terminal_copies_keep_identity() {
        let job = JobStatus::started(JobKind::Export);
        let done = job.done();
        assert_eq!(done.job_id, job.job_id);
        assert_eq!(done.kind, JobKind::Export);
        assert!(done.is_terminal());

        let failed = job.failed("disk full");
        assert_eq!(failed.status, JobState::Error);
        assert_eq!(failed.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_new_section_deserializes_without_classes() {
        let section: NewSection = serde_json::from_str(r#"{"name":"Ridge A"}"#).unwrap();
        assert_eq!(section.name, "Ridge A");
        assert!(section.geological_classes.is_empty());
    }

    #[test]
    fn test_has_class_code() {
        let section = Section {
            id: 1,
            name: "Ridge A".to_string(),
            geological_classes: vec![GeologicalClass {
                id: 7,
                name: "Basalt".to_string(),
                code: "B1".to_string(),
            }],
        };
        assert!(section.has_class_code("B1"));
        assert!(!section.has_class_code("b1"));
        assert_eq!(section.class_pairs(), vec![("Basalt", "B1")]);
    }
}
