// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the metrics listener.

use http::StatusCode;
use std::{error::Error as StdError, time::Duration};
use testmetrics_report::SerializeError;
use thiserror::Error;

/// An error that occurred while resolving the repository and branch a run is associated with.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VcsContextError {
    /// The VCS tool could not be started.
    #[error("failed to run `git {args}`")]
    Spawn {
        /// The arguments passed to the tool.
        args: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The VCS tool did not finish in time and was killed.
    #[error("`git {args}` timed out after {}s", timeout.as_secs())]
    Timeout {
        /// The arguments passed to the tool.
        args: String,

        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The VCS tool exited unsuccessfully.
    #[error("`git {args}` failed with {status}: {output}")]
    Failed {
        /// The arguments passed to the tool.
        args: String,

        /// A description of the exit status.
        status: String,

        /// The combined output of the tool.
        output: String,
    },

    /// The remote URL resolved to an empty string.
    #[error("unable to get git remote url")]
    EmptyRemoteUrl,

    /// Neither the environment nor the VCS tool produced a branch name.
    #[error("unable to get git branch")]
    EmptyBranch,
}

/// An error that occurred while delivering a report to the metrics collector.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeliveryError {
    /// The report could not be serialized.
    #[error("failed to serialize test results")]
    Serialize(#[from] SerializeError),

    /// The collector responded with a status other than 200.
    #[error("failed to send test results to `{endpoint}`: status code {}", status.as_u16())]
    Status {
        /// The endpoint the report was sent to.
        endpoint: String,

        /// The status code returned by the collector.
        status: StatusCode,
    },

    /// The request could not be completed.
    #[error("failed to send test results to `{endpoint}`")]
    Transport {
        /// The endpoint the report was sent to.
        endpoint: String,

        /// The underlying transport error.
        #[source]
        error: Box<dyn StdError + Send + Sync>,
    },
}

/// An error returned by [`TestRunListener::run_finished`](crate::listener::TestRunListener::run_finished).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunFinishedError {
    /// VCS context could not be resolved, and the listener is configured to abort in that case.
    #[error("error resolving VCS context for the test run report")]
    Vcs(#[from] VcsContextError),

    /// The report could not be delivered.
    #[error("error delivering the test run report")]
    Delivery(#[from] DeliveryError),
}

/// An error that occurred while reading listener configuration.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// An unrecognized VCS failure policy was specified.
    #[error(
        "unrecognized value for {var}: {input}\n(known values: {})",
        crate::config::VcsFailurePolicy::variants().join(", "),
    )]
    VcsFailurePolicy {
        /// The variable the value was read from.
        var: &'static str,

        /// The value provided.
        input: String,
    },

    /// The log filter could not be parsed.
    #[error("unable to parse {var} `{input}`: {reason}")]
    LogFilter {
        /// The variable the value was read from.
        var: &'static str,

        /// The value provided.
        input: String,

        /// The reason parsing failed.
        reason: String,
    },
}

/// An error that occurred while reading a libtest JSON event stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LibtestStreamError {
    /// Reading the stream failed.
    #[error("error reading libtest output")]
    Read(#[source] std::io::Error),

    /// Echoing a line failed.
    #[error("error writing libtest output")]
    Write(#[source] std::io::Error),

    /// The run-finished hook failed.
    #[error("test run finished, but reporting failed")]
    RunFinished(#[from] RunFinishedError),
}
