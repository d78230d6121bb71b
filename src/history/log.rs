//! Ordered log of observed state changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One observed state change, recorded by state name.
///
/// # Example
///
/// ```rust
/// use statekit::history::ChangeRecord;
/// use chrono::Utc;
///
/// let record = ChangeRecord {
///     sequence: 1,
///     from: "none".into(),
///     to: "Idle".into(),
///     timestamp: Utc::now(),
/// };
/// assert!(record.is_start());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// 1-based position in the history
    pub sequence: u64,
    /// Name of the state left
    pub from: String,
    /// Name of the state entered
    pub to: String,
    /// When the change was observed
    pub timestamp: DateTime<Utc>,
}

impl ChangeRecord {
    /// True for the change produced by `Machine::start`.
    pub fn is_start(&self) -> bool {
        self.sequence == 1 && self.from == crate::NONE_STATE_NAME
    }
}

/// Ordered history of state changes.
///
/// `record` returns a new history and leaves the original untouched;
/// `push` appends in place.
///
/// # Example
///
/// ```rust
/// use statekit::history::{ChangeRecord, StateHistory};
/// use chrono::Utc;
///
/// let history = StateHistory::new();
/// let history = history.record(ChangeRecord {
///     sequence: 1,
///     from: "Start".into(),
///     to: "Middle".into(),
///     timestamp: Utc::now(),
/// });
/// let history = history.record(ChangeRecord {
///     sequence: 2,
///     from: "Middle".into(),
///     to: "End".into(),
///     timestamp: Utc::now(),
/// });
///
/// assert_eq!(history.get_path(), vec!["Start", "Middle", "End"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    records: Vec<ChangeRecord>,
}

impl StateHistory {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Return a new history with `record` appended.
    pub fn record(&self, record: ChangeRecord) -> Self {
        let mut records = self.records.clone();
        records.push(record);
        Self { records }
    }

    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    /// States traversed: the first `from`, then every `to`.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(first) = self.records.first() {
            path.push(first.from.as_str());
        }
        for record in &self.records {
            path.push(record.to.as_str());
        }
        path
    }

    /// Time between the first and last recorded change.
    ///
    /// `None` when empty.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.records.first(), self.records.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&ChangeRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
