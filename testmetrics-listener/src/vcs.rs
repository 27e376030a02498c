// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolves the repository and branch a test run is associated with.

use crate::errors::VcsContextError;
use std::{
    fmt,
    time::{Duration, Instant},
};
use testmetrics_report::VcsEnrichment;
use tracing::{debug, trace};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs queries against a version control tool.
pub trait VcsQuery: fmt::Debug + Send + Sync {
    /// Runs the tool with the given arguments and returns the first line of its output, trimmed.
    fn query(&self, args: &[&str]) -> Result<String, VcsContextError>;
}

/// A [`VcsQuery`] that runs the `git` binary.
///
/// Each invocation is bounded by a timeout, after which the child process is killed.
#[derive(Clone, Debug)]
pub struct GitCli {
    git_path: String,
    timeout: Duration,
}

impl GitCli {
    /// Creates a new `GitCli` running `git` from `PATH`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            git_path: "git".to_owned(),
            timeout,
        }
    }

    /// Runs a different binary in place of `git`.
    pub fn with_git_path(mut self, git_path: impl Into<String>) -> Self {
        self.git_path = git_path.into();
        self
    }

    fn to_expression(&self, args: &[&str]) -> duct::Expression {
        duct::cmd(self.git_path.as_str(), args.iter().copied())
            .stdout_capture()
            .stderr_to_stdout()
            .unchecked()
    }
}

impl VcsQuery for GitCli {
    fn query(&self, args: &[&str]) -> Result<String, VcsContextError> {
        let args_str = args.join(" ");
        let expression = self.to_expression(args);
        trace!("Executing command: {:?}", expression);

        let handle = expression.start().map_err(|error| VcsContextError::Spawn {
            args: args_str.clone(),
            error,
        })?;

        let deadline = Instant::now() + self.timeout;
        let output = loop {
            match handle.try_wait() {
                Ok(Some(output)) => break output,
                Ok(None) if Instant::now() >= deadline => {
                    if let Err(error) = handle.kill() {
                        debug!("failed to kill timed out `git {args_str}`: {error}");
                    }
                    return Err(VcsContextError::Timeout {
                        args: args_str,
                        timeout: self.timeout,
                    });
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(error) => {
                    return Err(VcsContextError::Spawn {
                        args: args_str,
                        error,
                    });
                }
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            debug!("`git {args_str}` failed with {}", output.status);
            return Err(VcsContextError::Failed {
                args: args_str,
                status: output.status.to_string(),
                output: stdout.trim().to_owned(),
            });
        }

        Ok(stdout.lines().next().unwrap_or_default().trim().to_owned())
    }
}

/// The repository and branch a run is associated with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VcsContext {
    /// The repository URL, with any embedded credential removed.
    pub repository_url: String,

    /// The last path segment of the repository URL, without a `.git` suffix.
    pub repository_name: String,

    /// The branch name.
    pub branch: String,
}

impl VcsContext {
    /// Converts this context into report fields.
    pub fn into_enrichment(self) -> VcsEnrichment {
        VcsEnrichment {
            branch: self.branch,
            repository: self.repository_url,
            repository_name: self.repository_name,
        }
    }
}

/// Resolves a [`VcsContext`]. No results are cached.
#[derive(Debug)]
pub struct VcsResolver<'a> {
    query: &'a dyn VcsQuery,
    remote: &'a str,
    branch_override: Option<&'a str>,
}

impl<'a> VcsResolver<'a> {
    /// Creates a resolver for the given remote.
    ///
    /// A non-empty `branch_override` takes precedence over the branch checked out locally.
    pub fn new(query: &'a dyn VcsQuery, remote: &'a str, branch_override: Option<&'a str>) -> Self {
        Self {
            query,
            remote,
            branch_override,
        }
    }

    /// Resolves the repository URL, repository name and branch.
    pub fn resolve(&self) -> Result<VcsContext, VcsContextError> {
        let url_key = format!("remote.{}.url", self.remote);
        let url = self.query.query(&["config", "--get", &url_key])?;
        if url.is_empty() {
            return Err(VcsContextError::EmptyRemoteUrl);
        }

        let branch = match self.branch_override.filter(|branch| !branch.is_empty()) {
            Some(branch) => branch.to_owned(),
            None => self.query.query(&["rev-parse", "--abbrev-ref", "HEAD"])?,
        };
        if branch.is_empty() {
            return Err(VcsContextError::EmptyBranch);
        }

        let repository_url = scrub_credentials(&url).into_owned();
        let repository_name = repository_name_from_url(&repository_url).to_owned();
        Ok(VcsContext {
            repository_url,
            repository_name,
            branch,
        })
    }
}

/// Removes an embedded credential from an `https` URL.
///
/// `https://token@host/path` becomes `https://host/path`. Other schemes, and URLs without a
/// credential, are returned unchanged.
pub fn scrub_credentials(url: &str) -> std::borrow::Cow<'_, str> {
    let Some(rest) = url.strip_prefix("https://") else {
        return url.into();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("https://{}", &rest[at + 1..]).into(),
        None => url.into(),
    }
}

/// Returns the last path segment of a repository URL, without a `.git` suffix.
pub fn repository_name_from_url(url: &str) -> &str {
    let last_segment = url.rsplit('/').next().unwrap_or(url);
    last_segment.strip_suffix(".git").unwrap_or(last_segment)
}
