// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use http::StatusCode;
use pretty_assertions::assert_eq;
use testmetrics_listener::{
    errors::{LibtestStreamError, RunFinishedError},
    libtest::LibtestAdapter,
    listener::RunPhase,
};
use testmetrics_report::TestOutcome;

// Output of `cargo test` across two test binaries.
static CARGO_TEST_OUTPUT: &str = r#"{ "type": "suite", "event": "started", "test_count": 2 }
{ "type": "test", "event": "started", "name": "cart::tests::adds_item" }
{ "type": "test", "event": "started", "name": "cart::tests::removes_item" }
{ "type": "test", "name": "cart::tests::adds_item", "event": "ok" }
{ "type": "test", "name": "cart::tests::removes_item", "event": "failed", "stdout": "assertion failed\n" }
{ "type": "suite", "event": "failed", "passed": 1, "failed": 1, "ignored": 0, "measured": 0, "filtered_out": 0, "exec_time": 0.01 }
{ "type": "suite", "event": "started", "test_count": 2 }
{ "type": "test", "event": "started", "name": "checkout_flow" }
{ "type": "test", "event": "ignored", "name": "legacy_flow" }
{ "type": "test", "name": "checkout_flow", "event": "ok" }
{ "type": "suite", "event": "ok", "passed": 1, "failed": 0, "ignored": 1, "measured": 0, "filtered_out": 0, "exec_time": 0.02 }
"#;

#[test]
fn reports_whole_stream() -> Result<()> {
    let harness = Harness::new(StatusCode::OK);
    let mut echoed = Vec::new();
    LibtestAdapter::new(&harness.listener, "checkout")
        .run(CARGO_TEST_OUTPUT.as_bytes(), &mut echoed)?;

    assert_eq!(String::from_utf8(echoed)?, CARGO_TEST_OUTPUT);
    assert_eq!(harness.listener.phase(), RunPhase::Finished);

    let report = harness.transport.single_report();
    let summary: Vec<_> = report
        .test_cases()
        .iter()
        .map(|record| (record.fullname.as_str(), record.result))
        .collect();
    assert_eq!(
        summary,
        [
            ("cart::tests.adds_item", TestOutcome::Passed),
            ("cart::tests.removes_item", TestOutcome::Failed),
            ("checkout.checkout_flow", TestOutcome::Passed),
            ("checkout.legacy_flow", TestOutcome::Ignored),
        ]
    );
    assert_eq!(report.test_cases()[0].name, "cart::tests::adds_item");
    Ok(())
}

#[test]
fn delivery_failure_surfaces() {
    let harness = Harness::new(StatusCode::SERVICE_UNAVAILABLE);
    let err = LibtestAdapter::new(&harness.listener, "checkout")
        .run(CARGO_TEST_OUTPUT.as_bytes(), std::io::sink())
        .unwrap_err();
    assert!(
        matches!(
            err,
            LibtestStreamError::RunFinished(RunFinishedError::Delivery(_))
        ),
        "{err:?}"
    );
}

#[test]
fn slow_test_that_passes() -> Result<()> {
    let harness = Harness::new(StatusCode::OK);
    let stream = r#"{ "type": "suite", "event": "started", "test_count": 1 }
{ "type": "test", "event": "started", "name": "slow::tests::passes_eventually" }
{ "type": "test", "event": "timeout", "name": "slow::tests::passes_eventually" }
{ "type": "test", "name": "slow::tests::passes_eventually", "event": "ok", "exec_time": 75.0 }
"#;
    LibtestAdapter::new(&harness.listener, "root").run(stream.as_bytes(), std::io::sink())?;

    let report = harness.transport.single_report();
    assert_eq!(report.test_cases().len(), 1);
    assert_eq!(report.test_cases()[0].result, TestOutcome::Passed);
    Ok(())
}

#[test]
fn same_test_path_in_two_binaries() -> Result<()> {
    let harness = Harness::new(StatusCode::OK);
    let stream = r#"{ "type": "suite", "event": "started", "test_count": 1 }
{ "type": "test", "event": "started", "name": "tests::it_works" }
{ "type": "test", "name": "tests::it_works", "event": "failed" }
{ "type": "suite", "event": "failed", "passed": 0, "failed": 1 }
{ "type": "suite", "event": "started", "test_count": 1 }
{ "type": "test", "event": "started", "name": "tests::it_works" }
{ "type": "test", "name": "tests::it_works", "event": "ok" }
{ "type": "suite", "event": "ok", "passed": 1, "failed": 0 }
"#;
    LibtestAdapter::new(&harness.listener, "root").run(stream.as_bytes(), std::io::sink())?;

    let report = harness.transport.single_report();
    let summary: Vec<_> = report
        .test_cases()
        .iter()
        .map(|record| (record.classname.as_str(), record.result))
        .collect();
    assert_eq!(
        summary,
        [("tests", TestOutcome::Failed), ("tests#2", TestOutcome::Passed)]
    );
    Ok(())
}
