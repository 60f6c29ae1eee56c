//! Confirmation History
//!
//! Records every confirmation outcome delivered through a tool instance.
//! Records are immutable and kept in memory for the instance's lifetime.

use super::ConfirmationOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single confirmation decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    /// Unique identifier for this record (UUID)
    pub id: String,

    /// When the decision was made (UTC)
    pub timestamp: DateTime<Utc>,

    /// Command the user was asked about
    pub command: String,

    /// Command root the decision applies to
    pub root_command: String,

    /// The decision made
    pub outcome: ConfirmationOutcome,
}

impl ConfirmationRecord {
    /// Create a record stamped with a fresh id and the current time
    pub fn new(
        command: impl Into<String>,
        root_command: impl Into<String>,
        outcome: ConfirmationOutcome,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            command: command.into(),
            root_command: root_command.into(),
            outcome,
        }
    }
}

/// Storage for confirmation history
#[derive(Debug, Clone, Default)]
pub struct ConfirmationHistory {
    records: Vec<ConfirmationRecord>,
}

impl ConfirmationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    pub fn record(&mut self, record: ConfirmationRecord) {
        self.records.push(record);
    }

    /// Most recent decisions first (optionally limited)
    pub fn get_history(&self, limit: Option<usize>) -> Vec<&ConfirmationRecord> {
        let mut records: Vec<_> = self.records.iter().rev().collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = limit {
            records.truncate(limit);
        }

        records
    }

    /// All decisions for a command root
    pub fn get_by_root(&self, root: &str) -> Vec<&ConfirmationRecord> {
        self.records
            .iter()
            .filter(|r| r.root_command == root)
            .collect()
    }

    /// Count decisions as (proceed once, proceed always, cancel)
    pub fn count_by_outcome(&self) -> (usize, usize, usize) {
        let count = |outcome: ConfirmationOutcome| {
            self.records
                .iter()
                .filter(|r| r.outcome == outcome)
                .count()
        };
        (
            count(ConfirmationOutcome::ProceedOnce),
            count(ConfirmationOutcome::ProceedAlways),
            count(ConfirmationOutcome::Cancel),
        )
    }

    /// Export history as a JSON string
    pub fn export_json(&self) -> anyhow::Result<String> {
        let json = serde_json::to_string_pretty(&self.records)?;
        Ok(json)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history() {
        let history = ConfirmationHistory::new();
        assert!(history.is_empty());
        assert!(history.get_history(None).is_empty());
    }

    #[test]
    fn test_record_fields() {
        let record = ConfirmationRecord::new("git push", "git", ConfirmationOutcome::ProceedOnce);
        assert_eq!(record.command, "git push");
        assert_eq!(record.root_command, "git");
        assert!(uuid::Uuid::parse_str(&record.id).is_ok());
    }

    #[test]
    fn test_get_history_newest_first_with_limit() {
        let mut history = ConfirmationHistory::new();
        for i in 0..5 {
            history.record(ConfirmationRecord::new(
                format!("cmd{}", i),
                format!("cmd{}", i),
                ConfirmationOutcome::ProceedOnce,
            ));
        }

        let records = history.get_history(Some(3));
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].command, "cmd4");
    }

    #[test]
    fn test_get_by_root_and_counts() {
        let mut history = ConfirmationHistory::new();
        history.record(ConfirmationRecord::new("rm a", "rm", ConfirmationOutcome::Cancel));
        history.record(ConfirmationRecord::new("rm b", "rm", ConfirmationOutcome::ProceedOnce));
        history.record(ConfirmationRecord::new("ls", "ls", ConfirmationOutcome::ProceedAlways));

        assert_eq!(history.get_by_root("rm").len(), 2);
        assert_eq!(history.count_by_outcome(), (1, 1, 1));
    }

    #[test]
    fn test_export_json() {
        let mut history = ConfirmationHistory::new();
        history.record(ConfirmationRecord::new(
            "make test",
            "make",
            ConfirmationOutcome::ProceedAlways,
        ));

        let json = history.export_json().unwrap();
        assert!(json.contains("make test"));
        assert!(json.contains("ProceedAlways"));

        let parsed: Vec<ConfirmationRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
