// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An error that occurs while serializing a [`RunReport`](crate::RunReport).
///
/// Returned by [`RunReport::to_json_string`](crate::RunReport::to_json_string) and
/// [`RunReport::to_json_writer`](crate::RunReport::to_json_writer).
#[derive(Debug, Error)]
#[error("error serializing run report to JSON")]
pub struct SerializeError {
    #[from]
    inner: serde_json::Error,
}

/// An error that occurs while parsing a [`RunReport`](crate::RunReport) from JSON.
#[derive(Debug, Error)]
#[error("error parsing run report from JSON")]
pub struct DeserializeError {
    #[from]
    inner: serde_json::Error,
}
