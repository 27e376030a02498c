// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives a [`TestRunListener`] from libtest's JSON output.
//!
//! libtest emits one JSON object per line with `--format json` (currently behind
//! `-Z unstable-options`). A `cargo test` invocation runs several test binaries, each with its own
//! `suite` events; the whole stream is treated as one run, which finishes when the stream ends.
//!
//! The stream doesn't name the binary a suite belongs to. If a test name already appeared in an
//! earlier suite, its class name is qualified with the suite's ordinal (`tests#2`) so the two
//! records stay distinct.

use crate::{
    errors::LibtestStreamError,
    listener::TestRunListener,
    tracker::{CaseDescription, CaseIdentity},
};
use serde::Deserialize;
use std::{
    collections::HashSet,
    io::{BufRead, Write},
};
use tracing::{debug, trace};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LibtestEvent {
    Suite { event: SuiteEventKind },
    Test { event: TestEventKind, name: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SuiteEventKind {
    Started,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TestEventKind {
    Started,
    Ok,
    Failed,
    Timeout,
    Ignored,
    AllowedFail,
    #[serde(other)]
    Other,
}

/// Feeds libtest JSON events to a listener.
#[derive(Debug)]
pub struct LibtestAdapter<'a, L: ?Sized> {
    listener: &'a L,
    root_class: String,
    // 1-based ordinal of the current suite, 0 before the first one starts.
    suite: usize,
    earlier_suite_names: HashSet<String>,
    current_suite_names: HashSet<String>,
}

impl<'a, L: TestRunListener + ?Sized> LibtestAdapter<'a, L> {
    /// Creates an adapter for the given listener.
    ///
    /// Tests at the root of a crate (names without `::`) are reported under `root_class`.
    pub fn new(listener: &'a L, root_class: impl Into<String>) -> Self {
        Self {
            listener,
            root_class: root_class.into(),
            suite: 0,
            earlier_suite_names: HashSet::new(),
            current_suite_names: HashSet::new(),
        }
    }

    /// Forwards the event on this line, if any, to the listener.
    ///
    /// Returns false if the line isn't a libtest JSON event.
    pub fn handle_line(&mut self, line: &str) -> bool {
        let event: LibtestEvent = match serde_json::from_str(line.trim()) {
            Ok(event) => event,
            Err(error) => {
                trace!("not a libtest event ({error}): {line}");
                return false;
            }
        };

        match event {
            LibtestEvent::Suite {
                event: SuiteEventKind::Started,
            } => self.suite_started(),
            LibtestEvent::Suite { .. } | LibtestEvent::Other => {}
            LibtestEvent::Test { event, name } => {
                let case = self.describe(&name);
                self.current_suite_names.insert(name);
                let identity = case.identity();
                match event {
                    TestEventKind::Started => self.listener.case_started(&case),
                    TestEventKind::Ok => self.listener.case_finished(identity),
                    // libtest warns that the test is slow; an `ok` or `failed` event follows.
                    TestEventKind::Timeout => {
                        debug!(case = %identity, "test case running for over 60 seconds");
                    }
                    TestEventKind::Failed => {
                        self.listener.case_failed(identity);
                        self.listener.case_finished(identity);
                    }
                    TestEventKind::AllowedFail => {
                        self.listener.case_assumption_failed(identity);
                        self.listener.case_finished(identity);
                    }
                    TestEventKind::Ignored => self.listener.case_ignored(&case),
                    TestEventKind::Other => {}
                }
            }
        }
        true
    }

    /// Reads `reader` to the end, echoing each line to `writer`, then finishes the run.
    pub fn run(
        &mut self,
        reader: impl BufRead,
        mut writer: impl Write,
    ) -> Result<(), LibtestStreamError> {
        for line in reader.lines() {
            let line = line.map_err(LibtestStreamError::Read)?;
            writeln!(writer, "{line}").map_err(LibtestStreamError::Write)?;
            self.handle_line(&line);
        }
        writer.flush().map_err(LibtestStreamError::Write)?;

        self.listener.run_finished()?;
        Ok(())
    }

    fn suite_started(&mut self) {
        self.suite += 1;
        self.earlier_suite_names.extend(self.current_suite_names.drain());
        if self.suite == 1 {
            self.listener.run_started();
        } else {
            debug!(suite = self.suite, "test suite started");
        }
    }

    fn describe(&self, name: &str) -> CaseDescription {
        let (class_name, method_name) = match name.rsplit_once("::") {
            Some((class_name, method_name)) => (class_name, method_name),
            None => (self.root_class.as_str(), name),
        };
        let case = if self.earlier_suite_names.contains(name) {
            CaseDescription::new(format!("{class_name}#{}", self.suite), method_name)
        } else {
            CaseDescription::new(class_name, method_name)
        };
        case.with_display_name(name)
    }
}
