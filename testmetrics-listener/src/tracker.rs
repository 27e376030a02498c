// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracks the state of each test case within a run.
//!
//! The tracker is a plain single-threaded map; [`MetricsListener`](crate::listener::MetricsListener)
//! serializes access to it across threads.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::fmt;
use testmetrics_report::{TestCaseRecord, TestOutcome};
use tracing::debug;

/// The identity of a test case: the class or suite it belongs to, and its method name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaseIdentity {
    class_name: String,
    method_name: String,
}

impl CaseIdentity {
    /// Creates a new identity.
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// The class or suite name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The method name.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }
}

impl fmt::Display for CaseIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)
    }
}

/// A test case as announced by the host framework: its identity and a human-readable name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseDescription {
    identity: CaseIdentity,
    display_name: String,
}

impl CaseDescription {
    /// Creates a new description with a display name of `method(class)`.
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        let identity = CaseIdentity::new(class_name, method_name);
        let display_name = format!("{}({})", identity.method_name, identity.class_name);
        Self {
            identity,
            display_name,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// The identity of the test case.
    pub fn identity(&self) -> &CaseIdentity {
        &self.identity
    }

    /// The display name of the test case.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    fn new_record(&self, timestamp: DateTime<Utc>) -> TestCaseRecord {
        TestCaseRecord::new(
            self.display_name.as_str(),
            self.identity.class_name.as_str(),
            self.identity.method_name.as_str(),
            timestamp,
        )
    }
}

/// Per-case records for one run, keyed by [`CaseIdentity`].
///
/// Records are kept in first-insertion order.
#[derive(Clone, Debug, Default)]
pub struct CaseTracker {
    cases: IndexMap<CaseIdentity, TestCaseRecord>,
}

impl CaseTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a test case started. A previous record with the same identity is replaced.
    pub fn on_case_started(&mut self, case: &CaseDescription, timestamp: DateTime<Utc>) {
        let record = case.new_record(timestamp);
        if self.cases.insert(case.identity.clone(), record).is_some() {
            debug!(case = %case.identity, "test case started again, replacing earlier record");
        }
    }

    /// Records that a test case finished.
    ///
    /// Stamps the end time and duration. A case with no outcome yet is marked as passed; a
    /// failure or skip observed earlier is kept.
    pub fn on_case_finished(&mut self, identity: &CaseIdentity, timestamp: DateTime<Utc>) {
        let Some(record) = self.cases.get_mut(identity) else {
            debug!(case = %identity, "finish for unknown test case, ignoring");
            return;
        };
        record.set_end_time(timestamp);
        if record.result == TestOutcome::Unknown {
            record.set_result(TestOutcome::Passed);
        }
    }

    /// Records that a test case failed.
    pub fn on_case_failed(&mut self, identity: &CaseIdentity) {
        self.set_outcome(identity, TestOutcome::Failed);
    }

    /// Records that an assumption in a test case did not hold.
    pub fn on_case_skipped(&mut self, identity: &CaseIdentity) {
        self.set_outcome(identity, TestOutcome::Skipped);
    }

    /// Records a test case that was not run. No started or finished event is expected for it.
    pub fn on_case_ignored(&mut self, case: &CaseDescription, timestamp: DateTime<Utc>) {
        let mut record = case.new_record(timestamp);
        record.set_result(TestOutcome::Ignored);
        self.cases.insert(case.identity.clone(), record);
    }

    /// Returns the record for the given identity.
    pub fn get(&self, identity: &CaseIdentity) -> Option<&TestCaseRecord> {
        self.cases.get(identity)
    }

    /// The number of distinct test cases observed.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns true if no test cases were observed.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Returns a copy of the current records, without clearing the tracker.
    pub fn snapshot(&self) -> Vec<TestCaseRecord> {
        self.cases.values().cloned().collect()
    }

    /// Consumes the tracker, returning its records.
    pub fn into_records(self) -> Vec<TestCaseRecord> {
        self.cases.into_values().collect()
    }

    fn set_outcome(&mut self, identity: &CaseIdentity, outcome: TestOutcome) {
        match self.cases.get_mut(identity) {
            Some(record) => {
                record.set_result(outcome);
            }
            None => {
                debug!(case = %identity, %outcome, "outcome for unknown test case, ignoring");
            }
        }
    }
}
