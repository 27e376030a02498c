// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sends reports through a real HTTP client to a minimal local server.

use crate::fixtures::*;
use color_eyre::eyre::{Context, Result, bail, eyre};
use http::StatusCode;
use pretty_assertions::assert_eq;
use std::{
    io::{BufRead, BufReader, Read, Write},
    net::TcpListener,
    thread::{self, JoinHandle},
    time::Duration,
};
use testmetrics_listener::{
    config::VcsFailurePolicy,
    delivery::{MetricsClient, ReportTransport, UreqTransport},
    errors::{DeliveryError, RunFinishedError},
    listener::{MetricsListener, TestRunListener},
};
use testmetrics_report::{ReportEnvelope, RunReport};

#[derive(Debug)]
struct Request {
    request_line: String,
    content_type: Option<String>,
    body: String,
}

/// Accepts a single connection, answers it with `status` and returns what was received.
fn serve_once(status: u16) -> Result<(String, JoinHandle<Result<Request>>)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let url = format!("http://{}/junit", listener.local_addr()?);

    let handle = thread::spawn(move || -> Result<Request> {
        let (stream, _) = listener.accept()?;
        stream.set_read_timeout(Some(Duration::from_secs(10)))?;
        let mut reader = BufReader::new(stream);

        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        let mut content_length = None;
        let mut content_type = None;
        let mut chunked = false;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line)?;
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                bail!("malformed header: {line}");
            };
            let value = value.trim();
            match name.to_ascii_lowercase().as_str() {
                "content-length" => content_length = Some(value.parse::<usize>()?),
                "content-type" => content_type = Some(value.to_owned()),
                "transfer-encoding" => chunked = value.eq_ignore_ascii_case("chunked"),
                _ => {}
            }
        }

        let body = if chunked {
            read_chunked(&mut reader)?
        } else {
            let mut body = vec![0; content_length.unwrap_or(0)];
            reader.read_exact(&mut body)?;
            body
        };

        let mut stream = reader.into_inner();
        write!(
            stream,
            "HTTP/1.1 {status} Stub\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )?;
        stream.flush()?;

        Ok(Request {
            request_line: request_line.trim_end().to_owned(),
            content_type,
            body: String::from_utf8(body)?,
        })
    });
    Ok((url, handle))
}

fn read_chunked(reader: &mut impl BufRead) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line)?;
        let size = usize::from_str_radix(size_line.trim(), 16)
            .wrap_err_with(|| format!("bad chunk size: {size_line:?}"))?;
        let mut chunk = vec![0; size + 2];
        reader.read_exact(&mut chunk)?;
        if size == 0 {
            return Ok(body);
        }
        body.extend_from_slice(&chunk[..size]);
    }
}

fn join(handle: JoinHandle<Result<Request>>) -> Result<Request> {
    match handle.join() {
        Ok(request) => request,
        Err(_) => bail!("stub server panicked"),
    }
}

fn report() -> RunReport {
    RunReport::new(
        ReportEnvelope::new("ci", 2, "runner-1", "Linux", "widgets", false),
        [],
    )
}

#[test]
fn posts_json() -> Result<()> {
    let (url, handle) = serve_once(200)?;
    let transport = UreqTransport::new(Duration::from_secs(10));
    let report = report();

    MetricsClient::new(&url, &transport).send(&report)?;

    let request = join(handle)?;
    assert_eq!(request.request_line, "POST /junit HTTP/1.1");
    assert_eq!(request.content_type.as_deref(), Some("application/json"));
    assert_eq!(RunReport::from_json_str(&request.body)?, report);
    Ok(())
}

#[test]
fn server_error_status() -> Result<()> {
    let (url, handle) = serve_once(500)?;
    let transport = UreqTransport::new(Duration::from_secs(10));

    let status = transport
        .post_json(&url, "{}".to_owned())
        .map_err(|error| eyre!("{error}"))?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(join(handle)?.body, "{}");
    Ok(())
}

#[test]
fn listener_over_http() -> Result<()> {
    let (url, handle) = serve_once(500)?;
    let clock = ManualClock::new();
    let mut config = config(VcsFailurePolicy::OmitEnrichment);
    config.set_endpoint(url.clone());
    let listener = MetricsListener::builder(config)
        .clock(clock)
        .host(host_facts())
        .debug_probe(NoDebugger)
        .vcs_query(TableVcs::new(REMOTE_URL, "main"))
        .build();

    listener.run_started();
    listener.case_started(&case("CartTest", "addsItem"));
    listener.case_finished(&identity("CartTest", "addsItem"));
    let err = listener.run_finished().unwrap_err();
    match &err {
        RunFinishedError::Delivery(DeliveryError::Status { endpoint, status }) => {
            assert_eq!(endpoint, &url);
            assert_eq!(*status, StatusCode::INTERNAL_SERVER_ERROR);
        }
        other => bail!("unexpected error: {other:?}"),
    }
    assert_eq!(
        format!("{}", std::error::Error::source(&err).expect("has source")),
        format!("failed to send test results to `{url}`: status code 500")
    );

    let request = join(handle)?;
    let body: serde_json::Value = serde_json::from_str(&request.body)?;
    assert_eq!(body["jUnitTestCases"][0]["result"], "Passed");
    assert_eq!(body["repository"], REMOTE_URL);
    Ok(())
}

#[test]
fn connection_refused() -> Result<()> {
    // Bind and drop to find a port nothing is listening on.
    let addr = TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    let url = format!("http://{addr}/junit");
    let transport = UreqTransport::new(Duration::from_secs(2));

    let err = MetricsClient::new(&url, &transport)
        .send(&report())
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Transport { .. }), "{err:?}");
    Ok(())
}
