// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sends reports to the metrics collector.

use crate::errors::DeliveryError;
use http::StatusCode;
use std::{error::Error as StdError, fmt, time::Duration};
use testmetrics_report::RunReport;
use tracing::{debug, info};

/// Performs the HTTP request carrying a report.
pub trait ReportTransport: fmt::Debug + Send + Sync {
    /// POSTs `body` to `endpoint` with `Content-Type: application/json`, returning the response
    /// status.
    fn post_json(
        &self,
        endpoint: &str,
        body: String,
    ) -> Result<StatusCode, Box<dyn StdError + Send + Sync>>;
}

/// A [`ReportTransport`] backed by a `ureq` agent.
///
/// Connecting is bounded by a timeout; the rest of the request uses ureq's defaults.
#[derive(Debug)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Creates a new transport with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_connect(Some(connect_timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl ReportTransport for UreqTransport {
    fn post_json(
        &self,
        endpoint: &str,
        body: String,
    ) -> Result<StatusCode, Box<dyn StdError + Send + Sync>> {
        let response = self
            .agent
            .post(endpoint)
            .header("Content-Type", "application/json")
            .send(body)?;
        Ok(response.status())
    }
}

/// Delivers a [`RunReport`] with a single request. Failed deliveries are not retried.
#[derive(Debug)]
pub struct MetricsClient<'a> {
    endpoint: &'a str,
    transport: &'a dyn ReportTransport,
}

impl<'a> MetricsClient<'a> {
    /// Creates a client for the given endpoint.
    pub fn new(endpoint: &'a str, transport: &'a dyn ReportTransport) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    /// Serializes and sends the report. Any status other than 200 is an error.
    pub fn send(&self, report: &RunReport) -> Result<(), DeliveryError> {
        let body = report.to_json_string()?;
        debug!(
            endpoint = %self.endpoint,
            bytes = body.len(),
            "sending test run report",
        );

        let status = self
            .transport
            .post_json(self.endpoint, body)
            .map_err(|error| DeliveryError::Transport {
                endpoint: self.endpoint.to_owned(),
                error,
            })?;
        if status != StatusCode::OK {
            return Err(DeliveryError::Status {
                endpoint: self.endpoint.to_owned(),
                status,
            });
        }

        info!(
            run_id = %report.run_id(),
            "sent test run report to {} ({})",
            self.endpoint,
            report.outcome_counts(),
        );
        Ok(())
    }
}
