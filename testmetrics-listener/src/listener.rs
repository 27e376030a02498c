// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The listener a test framework drives over the course of one run.
//!
//! A run moves through three phases: not started, running, and finished. Per-case events are
//! only recorded while the run is running. When the run finishes, the report is assembled and
//! delivered synchronously; events that arrive afterwards are ignored.

use crate::{
    assembler::ReportAssembler,
    config::ListenerConfig,
    delivery::{MetricsClient, ReportTransport, UreqTransport},
    errors::RunFinishedError,
    host::{DebugProbe, HostInfo, LocalHost, TracerProbe},
    time::{Clock, SystemClock},
    tracker::{CaseDescription, CaseIdentity, CaseTracker},
    vcs::{GitCli, VcsQuery},
};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Lifecycle notifications sent by a test framework.
///
/// The framework calls [`run_started`](Self::run_started) before any case events and
/// [`run_finished`](Self::run_finished) after all of them.
pub trait TestRunListener {
    /// The run started.
    fn run_started(&self);

    /// A test case started.
    fn case_started(&self, case: &CaseDescription);

    /// A test case finished.
    fn case_finished(&self, identity: &CaseIdentity);

    /// A test case failed.
    fn case_failed(&self, identity: &CaseIdentity);

    /// An assumption in a test case did not hold.
    fn case_assumption_failed(&self, identity: &CaseIdentity);

    /// A test case will not be run.
    fn case_ignored(&self, case: &CaseDescription);

    /// The run finished. Errors indicate that reporting failed, not that tests failed.
    fn run_finished(&self) -> Result<(), RunFinishedError>;
}

/// The phase a run is in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunPhase {
    /// `run_started` has not been called yet.
    NotStarted,

    /// Case events are being recorded.
    Running,

    /// The run has finished; no further events are recorded.
    Finished,
}

#[derive(Debug)]
enum RunState {
    NotStarted,
    Running {
        started_at: DateTime<Utc>,
        tracker: CaseTracker,
    },
    Finished,
}

impl RunState {
    fn phase(&self) -> RunPhase {
        match self {
            Self::NotStarted => RunPhase::NotStarted,
            Self::Running { .. } => RunPhase::Running,
            Self::Finished => RunPhase::Finished,
        }
    }
}

/// A [`TestRunListener`] that reports the run to a metrics collector once it finishes.
///
/// A listener observes exactly one run. Events may be sent from multiple threads.
#[derive(Debug)]
pub struct MetricsListener {
    config: ListenerConfig,
    clock: Box<dyn Clock>,
    host: Box<dyn HostInfo>,
    debug_probe: Box<dyn DebugProbe>,
    vcs_query: Box<dyn VcsQuery>,
    transport: Box<dyn ReportTransport>,
    state: Mutex<RunState>,
}

impl MetricsListener {
    /// Creates a listener using the system clock, the local host, `git` and HTTP.
    pub fn new(config: ListenerConfig) -> Self {
        Self::builder(config).build()
    }

    /// Returns a builder for a listener with some collaborators replaced.
    pub fn builder(config: ListenerConfig) -> MetricsListenerBuilder {
        MetricsListenerBuilder {
            config,
            clock: None,
            host: None,
            debug_probe: None,
            vcs_query: None,
            transport: None,
        }
    }

    /// The configuration this listener was created with.
    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// The phase the run is in.
    pub fn phase(&self) -> RunPhase {
        self.lock_state().phase()
    }

    /// The number of test cases recorded so far. Always 0 unless the run is in progress.
    pub fn tracked_case_count(&self) -> usize {
        match &*self.lock_state() {
            RunState::Running { tracker, .. } => tracker.len(),
            RunState::NotStarted | RunState::Finished => 0,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_tracker(
        &self,
        event: &'static str,
        f: impl FnOnce(&mut CaseTracker, DateTime<Utc>),
    ) {
        let mut state = self.lock_state();
        match &mut *state {
            RunState::Running { tracker, .. } => f(tracker, self.clock.now()),
            other => {
                debug!(event, phase = ?other.phase(), "ignoring test case event outside a run");
            }
        }
    }
}

impl TestRunListener for MetricsListener {
    fn run_started(&self) {
        let mut state = self.lock_state();
        match &*state {
            RunState::NotStarted => {
                let started_at = self.clock.now();
                debug!(%started_at, "test run started");
                *state = RunState::Running {
                    started_at,
                    tracker: CaseTracker::new(),
                };
            }
            other => {
                debug!(phase = ?other.phase(), "ignoring repeated run start");
            }
        }
    }

    fn case_started(&self, case: &CaseDescription) {
        self.with_tracker("case-started", |tracker, now| {
            tracker.on_case_started(case, now);
        });
    }

    fn case_finished(&self, identity: &CaseIdentity) {
        self.with_tracker("case-finished", |tracker, now| {
            tracker.on_case_finished(identity, now);
        });
    }

    fn case_failed(&self, identity: &CaseIdentity) {
        self.with_tracker("case-failed", |tracker, _| {
            tracker.on_case_failed(identity);
        });
    }

    fn case_assumption_failed(&self, identity: &CaseIdentity) {
        self.with_tracker("case-assumption-failed", |tracker, _| {
            tracker.on_case_skipped(identity);
        });
    }

    fn case_ignored(&self, case: &CaseDescription) {
        self.with_tracker("case-ignored", |tracker, now| {
            tracker.on_case_ignored(case, now);
        });
    }

    fn run_finished(&self) -> Result<(), RunFinishedError> {
        // The tracker is moved out before any reporting work, so the lock isn't held across the
        // network call and nothing of the run remains if delivery fails.
        let previous = std::mem::replace(&mut *self.lock_state(), RunState::Finished);
        let (started_at, tracker) = match previous {
            RunState::Running {
                started_at,
                tracker,
            } => (started_at, tracker),
            other => {
                debug!(phase = ?other.phase(), "run finished outside a run, not reporting");
                return Ok(());
            }
        };

        let elapsed = self.clock.now() - started_at;
        debug!(
            cases = tracker.len(),
            elapsed_ms = elapsed.num_milliseconds(),
            "test run finished",
        );

        let assembler = ReportAssembler::new(
            &self.config,
            &*self.host,
            &*self.debug_probe,
            &*self.vcs_query,
        );
        let report = assembler.assemble(tracker.into_records())?;

        MetricsClient::new(self.config.endpoint(), &*self.transport).send(&report)?;
        Ok(())
    }
}

/// Builds a [`MetricsListener`]. Collaborators that aren't set use their defaults.
#[derive(Debug)]
pub struct MetricsListenerBuilder {
    config: ListenerConfig,
    clock: Option<Box<dyn Clock>>,
    host: Option<Box<dyn HostInfo>>,
    debug_probe: Option<Box<dyn DebugProbe>>,
    vcs_query: Option<Box<dyn VcsQuery>>,
    transport: Option<Box<dyn ReportTransport>>,
}

impl MetricsListenerBuilder {
    /// Sets the source of event timestamps.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Sets the source of host facts.
    pub fn host(mut self, host: impl HostInfo + 'static) -> Self {
        self.host = Some(Box::new(host));
        self
    }

    /// Sets the debugger probe.
    pub fn debug_probe(mut self, debug_probe: impl DebugProbe + 'static) -> Self {
        self.debug_probe = Some(Box::new(debug_probe));
        self
    }

    /// Sets the VCS query runner.
    pub fn vcs_query(mut self, vcs_query: impl VcsQuery + 'static) -> Self {
        self.vcs_query = Some(Box::new(vcs_query));
        self
    }

    /// Sets the transport used to deliver the report.
    pub fn transport(mut self, transport: impl ReportTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Builds the listener.
    pub fn build(self) -> MetricsListener {
        let Self {
            config,
            clock,
            host,
            debug_probe,
            vcs_query,
            transport,
        } = self;

        MetricsListener {
            clock: clock.unwrap_or_else(|| Box::new(SystemClock)),
            host: host.unwrap_or_else(|| Box::new(LocalHost)),
            debug_probe: debug_probe
                .unwrap_or_else(|| Box::new(TracerProbe::from_config(&config))),
            vcs_query: vcs_query.unwrap_or_else(|| Box::new(GitCli::new(config.vcs_timeout()))),
            transport: transport
                .unwrap_or_else(|| Box::new(UreqTransport::new(config.connect_timeout()))),
            config,
            state: Mutex::new(RunState::NotStarted),
        }
    }
}
