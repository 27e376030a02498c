// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Listener configuration, read once from the environment.

use crate::errors::ConfigError;
use clap::ValueEnum;
use std::{fmt, str::FromStr, time::Duration};

/// The endpoint reports are sent to if [`ENDPOINT_ENV`] is unset or empty.
pub const DEFAULT_ENDPOINT: &str = "http://compilation-metrics/junit";

/// Overrides the endpoint reports are sent to.
pub const ENDPOINT_ENV: &str = "BUILD_METRICS_ES_ENDPOINT";

/// Overrides the branch name resolved through git.
pub const BRANCH_ENV: &str = "CI_COMMIT_REF_NAME";

/// Selects a [`VcsFailurePolicy`].
pub const VCS_FAILURE_ENV: &str = "TESTMETRICS_VCS_FAILURE";

/// A launch argument containing this value marks the process as being debugged.
pub const DEBUG_ARG_MARKER_ENV: &str = "TESTMETRICS_DEBUG_ARG_MARKER";

/// The remote whose URL is reported.
pub const DEFAULT_REMOTE: &str = "origin";

/// Bounds establishing a connection to the metrics collector.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounds each invocation of the VCS tool.
pub const VCS_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// What to do when the repository or branch cannot be resolved.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum VcsFailurePolicy {
    /// Leave the VCS fields out of the report and send it anyway.
    #[default]
    #[value(name = "omit")]
    OmitEnrichment,

    /// Fail the run-finished hook without sending a report.
    Abort,
}

impl VcsFailurePolicy {
    /// Returns string representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["omit", "abort"]
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::OmitEnrichment => "omit",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for VcsFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VcsFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "omit" => Ok(Self::OmitEnrichment),
            "abort" => Ok(Self::Abort),
            other => Err(ConfigError::VcsFailurePolicy {
                var: VCS_FAILURE_ENV,
                input: other.to_owned(),
            }),
        }
    }
}

/// Configuration for a [`MetricsListener`](crate::listener::MetricsListener).
///
/// Environment variables are read once, when the configuration is constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    endpoint: String,
    branch_override: Option<String>,
    remote: String,
    vcs_failure_policy: VcsFailurePolicy,
    debug_arg_marker: Option<String>,
    connect_timeout: Duration,
    vcs_timeout: Duration,
}

impl ListenerConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads configuration through the given environment lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |var: &str| lookup(var).filter(|value| !value.is_empty());

        let vcs_failure_policy = match non_empty(VCS_FAILURE_ENV) {
            Some(policy) => policy.parse()?,
            None => VcsFailurePolicy::default(),
        };

        Ok(Self {
            endpoint: non_empty(ENDPOINT_ENV).unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned()),
            branch_override: non_empty(BRANCH_ENV),
            remote: DEFAULT_REMOTE.to_owned(),
            vcs_failure_policy,
            debug_arg_marker: non_empty(DEBUG_ARG_MARKER_ENV),
            connect_timeout: CONNECT_TIMEOUT,
            vcs_timeout: VCS_COMMAND_TIMEOUT,
        })
    }

    /// The endpoint reports are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The branch name provided by CI, if any.
    pub fn branch_override(&self) -> Option<&str> {
        self.branch_override.as_deref()
    }

    /// The git remote whose URL is reported.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// What to do when VCS context cannot be resolved.
    pub fn vcs_failure_policy(&self) -> VcsFailurePolicy {
        self.vcs_failure_policy
    }

    /// The launch argument marker that counts as debug mode, if any.
    pub fn debug_arg_marker(&self) -> Option<&str> {
        self.debug_arg_marker.as_deref()
    }

    /// The connect timeout for the metrics collector.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// The timeout for each VCS tool invocation.
    pub fn vcs_timeout(&self) -> Duration {
        self.vcs_timeout
    }

    /// Overrides the endpoint.
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) -> &mut Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Overrides the branch name.
    pub fn set_branch_override(&mut self, branch: Option<String>) -> &mut Self {
        self.branch_override = branch.filter(|branch| !branch.is_empty());
        self
    }

    /// Overrides the launch argument marker that counts as debug mode.
    pub fn set_debug_arg_marker(&mut self, marker: Option<String>) -> &mut Self {
        self.debug_arg_marker = marker.filter(|marker| !marker.is_empty());
        self
    }

    /// Overrides the VCS failure policy.
    pub fn set_vcs_failure_policy(&mut self, policy: VcsFailurePolicy) -> &mut Self {
        self.vcs_failure_policy = policy;
        self
    }
}
