// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Facts about the host and process a test run happens in.

use crate::config::ListenerConfig;
use std::{fmt, path::Path};
use testmetrics_report::ReportEnvelope;
use tracing::{debug, warn};

/// Used in place of host facts that could not be determined.
pub const UNKNOWN: &str = "unknown";

/// Facts about the host, gathered when a report is assembled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostFacts {
    /// The user running the tests.
    pub user_name: String,

    /// The number of logical CPUs available to the process.
    pub cpu_count: usize,

    /// The host name.
    pub hostname: String,

    /// The operating system name.
    pub os: String,

    /// The final path segment of the working directory.
    pub project_name: String,
}

impl HostFacts {
    /// Gathers facts about the current host and process.
    ///
    /// Facts that cannot be determined are logged and reported as [`UNKNOWN`].
    pub fn current() -> Self {
        let user_name = whoami::username().unwrap_or_else(|error| {
            warn!("unable to determine user name ({error})");
            UNKNOWN.to_owned()
        });
        let hostname = whoami::hostname().unwrap_or_else(|error| {
            warn!("unable to determine hostname ({error})");
            UNKNOWN.to_owned()
        });
        let project_name = match std::env::current_dir() {
            Ok(dir) => project_name_from_dir(&dir),
            Err(error) => {
                warn!("unable to determine current directory ({error})");
                UNKNOWN.to_owned()
            }
        };

        Self {
            user_name,
            cpu_count: num_cpus(),
            hostname,
            os: whoami::platform().to_string(),
            project_name,
        }
    }

    /// Builds a report envelope from these facts.
    pub fn into_envelope(self, is_debugger_attached: bool) -> ReportEnvelope {
        ReportEnvelope::new(
            self.user_name,
            self.cpu_count,
            self.hostname,
            self.os,
            self.project_name,
            is_debugger_attached,
        )
    }
}

fn num_cpus() -> usize {
    match std::thread::available_parallelism() {
        Ok(count) => count.into(),
        Err(err) => {
            warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
            1
        }
    }
}

fn project_name_from_dir(dir: &Path) -> String {
    match dir.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => UNKNOWN.to_owned(),
    }
}

/// A source of [`HostFacts`].
pub trait HostInfo: fmt::Debug + Send + Sync {
    /// Gathers facts about the host.
    fn gather(&self) -> HostFacts;
}

/// A [`HostInfo`] describing the machine and process this code runs in.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalHost;

impl HostInfo for LocalHost {
    fn gather(&self) -> HostFacts {
        HostFacts::current()
    }
}

/// Fixed facts, useful when the host is described by the caller.
impl HostInfo for HostFacts {
    fn gather(&self) -> HostFacts {
        self.clone()
    }
}

/// Determines whether the process is being debugged.
pub trait DebugProbe: fmt::Debug + Send + Sync {
    /// Returns true if a debugger is attached, or the process was launched in debug mode.
    fn is_debug_mode_active(&self) -> bool;
}

/// A [`DebugProbe`] that inspects the current process.
///
/// On Linux, a debugger is considered attached if `/proc/self/status` reports a non-zero
/// `TracerPid`. On all platforms, a launch argument containing the configured marker (if any)
/// also counts as debug mode.
#[derive(Clone, Debug, Default)]
pub struct TracerProbe {
    launch_arg_marker: Option<String>,
}

impl TracerProbe {
    /// Creates a probe that only checks for an attached tracer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a probe using the launch argument marker from `config`, if one is set.
    pub fn from_config(config: &ListenerConfig) -> Self {
        Self {
            launch_arg_marker: config.debug_arg_marker().map(str::to_owned),
        }
    }

    /// Also treats a launch argument containing `marker` as debug mode.
    pub fn with_launch_arg_marker(mut self, marker: impl Into<String>) -> Self {
        self.launch_arg_marker = Some(marker.into());
        self
    }

    fn launched_with_marker(&self, args: impl IntoIterator<Item = String>) -> bool {
        match &self.launch_arg_marker {
            Some(marker) => args.into_iter().any(|arg| arg.contains(marker.as_str())),
            None => false,
        }
    }
}

impl DebugProbe for TracerProbe {
    fn is_debug_mode_active(&self) -> bool {
        let args = std::env::args_os().map(|arg| arg.to_string_lossy().into_owned());
        self.launched_with_marker(args) || tracer_attached()
    }
}

fn tracer_attached() -> bool {
    if !cfg!(target_os = "linux") {
        return false;
    }
    match fs_err::read_to_string("/proc/self/status") {
        Ok(status) => parse_tracer_pid(&status).is_some_and(|pid| pid != 0),
        Err(error) => {
            debug!("unable to read process status: {error}");
            false
        }
    }
}

fn parse_tracer_pid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|pid| pid.trim().parse().ok())
}
