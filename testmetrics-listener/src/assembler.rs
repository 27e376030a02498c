// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Combines tracked test cases with host and repository facts into a [`RunReport`].

use crate::{
    config::{ListenerConfig, VcsFailurePolicy},
    errors::VcsContextError,
    host::{DebugProbe, HostInfo},
    vcs::{VcsQuery, VcsResolver},
};
use testmetrics_report::{RunReport, TestCaseRecord};
use tracing::{debug, warn};

/// Builds the report for a finished run.
#[derive(Debug)]
pub struct ReportAssembler<'a> {
    config: &'a ListenerConfig,
    host: &'a dyn HostInfo,
    debug_probe: &'a dyn DebugProbe,
    vcs_query: &'a dyn VcsQuery,
}

impl<'a> ReportAssembler<'a> {
    /// Creates a new assembler.
    pub fn new(
        config: &'a ListenerConfig,
        host: &'a dyn HostInfo,
        debug_probe: &'a dyn DebugProbe,
        vcs_query: &'a dyn VcsQuery,
    ) -> Self {
        Self {
            config,
            host,
            debug_probe,
            vcs_query,
        }
    }

    /// Assembles a report containing `test_cases`, in the order given.
    ///
    /// If VCS context cannot be resolved, the configured [`VcsFailurePolicy`] decides whether
    /// the report is built without VCS fields or an error is returned.
    pub fn assemble(
        &self,
        test_cases: Vec<TestCaseRecord>,
    ) -> Result<RunReport, VcsContextError> {
        let facts = self.host.gather();
        let mut envelope = facts.into_envelope(self.debug_probe.is_debug_mode_active());

        let resolver = VcsResolver::new(
            self.vcs_query,
            self.config.remote(),
            self.config.branch_override(),
        );
        match resolver.resolve() {
            Ok(context) => {
                debug!(
                    repository = %context.repository_url,
                    branch = %context.branch,
                    "resolved VCS context",
                );
                envelope.enrich(context.into_enrichment());
            }
            Err(error) => match self.config.vcs_failure_policy() {
                VcsFailurePolicy::OmitEnrichment => {
                    warn!("omitting VCS fields from test run report: {error}");
                }
                VcsFailurePolicy::Abort => return Err(error),
            },
        }

        Ok(RunReport::new(envelope, test_cases))
    }
}
