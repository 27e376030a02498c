// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use http::StatusCode;
use std::{
    error::Error as StdError,
    io::{self, Write},
};
use testmetrics_listener::{
    config::{ListenerConfig, VcsFailurePolicy},
    delivery::ReportTransport,
    libtest::LibtestAdapter,
    listener::MetricsListener,
    output,
};

/// Reports the results of `cargo test -- -Z unstable-options --format json` to a metrics
/// collector.
///
/// The libtest JSON stream is read from stdin and echoed to stdout. When the stream ends, a
/// report is sent to the endpoint in BUILD_METRICS_ES_ENDPOINT, or the default endpoint.
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// Send the report to this endpoint instead.
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// What to do if the git remote or branch cannot be determined.
    ///
    /// Defaults to TESTMETRICS_VCS_FAILURE, or omit.
    #[arg(long, value_enum)]
    vcs_failure: Option<VcsFailurePolicy>,

    /// Class name for tests at the root of a crate.
    #[arg(long, default_value = "root")]
    root_class: String,

    /// Print the report to stderr instead of sending it.
    #[arg(long)]
    dry_run: bool,
}

/// Writes the report to stderr in place of a request, keeping stdout for the echoed stream.
#[derive(Debug)]
struct StderrTransport;

impl ReportTransport for StderrTransport {
    fn post_json(
        &self,
        _endpoint: &str,
        body: String,
    ) -> Result<StatusCode, Box<dyn StdError + Send + Sync>> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{body}")?;
        stderr.flush()?;
        Ok(StatusCode::OK)
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    output::init_logger()?;

    let app = App::parse();

    let mut config = ListenerConfig::from_env()?;
    if let Some(endpoint) = app.endpoint {
        config.set_endpoint(endpoint);
    }
    if let Some(policy) = app.vcs_failure {
        config.set_vcs_failure_policy(policy);
    }

    let builder = MetricsListener::builder(config);
    let listener = if app.dry_run {
        builder.transport(StderrTransport).build()
    } else {
        builder.build()
    };

    LibtestAdapter::new(&listener, app.root_class).run(io::stdin().lock(), io::stdout().lock())?;
    Ok(())
}
