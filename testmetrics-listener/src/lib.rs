// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Observes a test run through lifecycle events and reports per-test outcomes, along with host and
//! repository context, to a metrics collector.
//!
//! The entry point is [`MetricsListener`](listener::MetricsListener), which implements
//! [`TestRunListener`](listener::TestRunListener). A test framework calls it as the run
//! progresses; when the run finishes, a single [`RunReport`](testmetrics_report::RunReport) is
//! assembled and POSTed as JSON.

pub mod assembler;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod host;
pub mod libtest;
pub mod listener;
pub mod output;
pub mod time;
pub mod tracker;
pub mod vcs;

pub use testmetrics_report as report;
