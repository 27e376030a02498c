// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{DeserializeError, SerializeError};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use newtype_uuid::{TypedUuid, TypedUuidKind, TypedUuidTag};
use serde::{Deserialize, Serialize};
use std::{fmt, io};

/// A marker type for [`ReportUuid`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum ReportKind {}

impl TypedUuidKind for ReportKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("testmetrics_report");
        TAG
    }
}

/// The envelope identifier of a [`RunReport`], serialized as `id`.
pub type ReportUuid = TypedUuid<ReportKind>;

/// A marker type for [`RunUuid`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum RunKind {}

impl TypedUuidKind for RunKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("testmetrics_run");
        TAG
    }
}

/// The run identifier of a [`RunReport`], serialized as `runId`.
///
/// This is generated independently of the [`ReportUuid`]; the two are not expected to match.
pub type RunUuid = TypedUuid<RunKind>;

/// A marker type for [`TestCaseUuid`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum TestCaseKind {}

impl TypedUuidKind for TestCaseKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("testmetrics_test_case");
        TAG
    }
}

/// The identifier of a single [`TestCaseRecord`].
pub type TestCaseUuid = TypedUuid<TestCaseKind>;

/// The outcome of a test case.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestOutcome {
    /// The test case has started but no outcome has been observed yet.
    #[default]
    Unknown,

    /// The test case finished without a failure or skip signal.
    Passed,

    /// The test case failed.
    Failed,

    /// An assumption in the test case did not hold.
    Skipped,

    /// The test case was never run.
    Ignored,
}

impl TestOutcome {
    /// All outcomes, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Unknown,
        Self::Passed,
        Self::Failed,
        Self::Skipped,
        Self::Ignored,
    ];

    /// Returns the string used for this outcome in serialized reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::Skipped => "Skipped",
            Self::Ignored => "Ignored",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single test case observed during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TestCaseRecord {
    /// A random identifier for this record.
    pub id: TestCaseUuid,

    /// The display name of the test case.
    pub name: String,

    /// `<classname>.<methodname>`.
    pub fullname: String,

    /// The method (function) name of the test case.
    pub methodname: String,

    /// The class or suite the test case belongs to.
    pub classname: String,

    /// The outcome of the test case.
    pub result: TestOutcome,

    /// The time at which the test case started, or was ignored.
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,

    /// The time at which the test case finished.
    ///
    /// Equal to `start_time` until the test case finishes.
    #[serde(rename = "endTime")]
    pub end_time: DateTime<Utc>,

    /// `end_time - start_time`, in milliseconds.
    pub duration: u64,
}

impl TestCaseRecord {
    /// Creates a new record with outcome [`TestOutcome::Unknown`], starting and ending at
    /// `start_time`.
    pub fn new(
        name: impl Into<String>,
        classname: impl Into<String>,
        methodname: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        let classname = classname.into();
        let methodname = methodname.into();
        Self {
            id: TestCaseUuid::new_v4(),
            name: name.into(),
            fullname: format!("{classname}.{methodname}"),
            methodname,
            classname,
            result: TestOutcome::Unknown,
            start_time,
            end_time: start_time,
            duration: 0,
        }
    }

    /// Sets the outcome of this record.
    pub fn set_result(&mut self, result: TestOutcome) -> &mut Self {
        self.result = result;
        self
    }

    /// Sets the end time and recomputes the duration.
    ///
    /// An end time before the start time results in a duration of 0.
    pub fn set_end_time(&mut self, end_time: DateTime<Utc>) -> &mut Self {
        self.end_time = end_time;
        self.duration = (end_time - self.start_time)
            .num_milliseconds()
            .try_into()
            .unwrap_or(0);
        self
    }
}

/// VCS-derived fields added to a [`ReportEnvelope`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VcsEnrichment {
    /// The branch the run is associated with.
    pub branch: String,

    /// The repository URL, with any embedded credential removed.
    pub repository: String,

    /// The short name of the repository.
    pub repository_name: String,
}

/// Facts about the host, user and repository a run happened in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ReportEnvelope {
    /// The user that ran the tests.
    pub user_name: String,

    /// The number of logical CPUs available.
    pub cpu_count: usize,

    /// The host the tests ran on.
    pub hostname: String,

    /// The operating system name.
    pub os: String,

    /// The project name.
    ///
    /// This is the working directory's final path segment, or the repository name if VCS
    /// enrichment succeeded.
    pub project_name: String,

    /// Whether a debugger was attached to the process.
    pub is_debugger_attached: bool,

    /// The branch, present only with VCS enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// The repository URL, present only with VCS enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// The repository name, present only with VCS enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
}

impl ReportEnvelope {
    /// Creates a new envelope without VCS enrichment.
    pub fn new(
        user_name: impl Into<String>,
        cpu_count: usize,
        hostname: impl Into<String>,
        os: impl Into<String>,
        project_name: impl Into<String>,
        is_debugger_attached: bool,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            cpu_count,
            hostname: hostname.into(),
            os: os.into(),
            project_name: project_name.into(),
            is_debugger_attached,
            branch: None,
            repository: None,
            repository_name: None,
        }
    }

    /// Adds VCS fields to this envelope.
    ///
    /// The repository name also replaces the project name.
    pub fn enrich(&mut self, vcs: VcsEnrichment) -> &mut Self {
        let VcsEnrichment {
            branch,
            repository,
            repository_name,
        } = vcs;
        self.project_name.clone_from(&repository_name);
        self.branch = Some(branch);
        self.repository = Some(repository);
        self.repository_name = Some(repository_name);
        self
    }

    /// Returns true if VCS fields are present.
    pub fn is_enriched(&self) -> bool {
        self.repository.is_some()
    }
}

/// The report for a single test run.
///
/// A `RunReport` cannot be modified after it is constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    id: ReportUuid,
    #[serde(flatten)]
    envelope: ReportEnvelope,
    #[serde(rename = "jUnitTestCases")]
    test_cases: Vec<TestCaseRecord>,
    run_id: RunUuid,
}

impl RunReport {
    /// Creates a new report, generating fresh report and run identifiers.
    pub fn new(
        envelope: ReportEnvelope,
        test_cases: impl IntoIterator<Item = TestCaseRecord>,
    ) -> Self {
        Self {
            id: ReportUuid::new_v4(),
            envelope,
            test_cases: test_cases.into_iter().collect(),
            run_id: RunUuid::new_v4(),
        }
    }

    /// The envelope identifier.
    pub fn id(&self) -> ReportUuid {
        self.id
    }

    /// The run identifier.
    pub fn run_id(&self) -> RunUuid {
        self.run_id
    }

    /// Facts about the host and repository.
    pub fn envelope(&self) -> &ReportEnvelope {
        &self.envelope
    }

    /// The test cases in this report.
    pub fn test_cases(&self) -> &[TestCaseRecord] {
        &self.test_cases
    }

    /// Counts the test cases in this report by outcome.
    pub fn outcome_counts(&self) -> OutcomeCounts {
        let mut counts: IndexMap<TestOutcome, usize> =
            TestOutcome::ALL.iter().map(|outcome| (*outcome, 0)).collect();
        for test_case in &self.test_cases {
            *counts.entry(test_case.result).or_default() += 1;
        }
        OutcomeCounts { counts }
    }

    /// Serializes this report to the given writer as JSON.
    pub fn to_json_writer(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Serializes this report to a JSON string.
    pub fn to_json_string(&self) -> Result<String, SerializeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a report from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, DeserializeError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Per-outcome tallies for a [`RunReport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutcomeCounts {
    counts: IndexMap<TestOutcome, usize>,
}

impl OutcomeCounts {
    /// Returns the number of test cases with the given outcome.
    pub fn get(&self, outcome: TestOutcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    /// Returns the total number of test cases.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for OutcomeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} total", self.total())?;
        for (outcome, count) in &self.counts {
            if *count > 0 {
                write!(f, ", {count} {}", outcome.as_str().to_lowercase())?;
            }
        }
        Ok(())
    }
}
