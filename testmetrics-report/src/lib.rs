// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Data model and JSON serializer for test run metrics reports.
//!
//! A [`RunReport`] is built once per test run from a [`ReportEnvelope`] (facts about the host and
//! repository) and the list of [`TestCaseRecord`]s observed during the run.

mod errors;
mod report;

pub use errors::*;
pub use report::*;
