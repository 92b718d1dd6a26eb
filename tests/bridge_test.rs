//! Integration tests for the converter bridge
//!
//! Each test installs a small shell script standing in for pandoc and drives
//! the bridge against it.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use document_normalizer::bridge::{ConversionOutput, ConversionRequest, Converter, ConverterBridge};
use document_normalizer::config::BridgeOptions;
use document_normalizer::error::DocumentError;

/// Install `body` as an executable stub converter
fn stub_converter(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("pandoc");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
    path
}

fn bridge_for(executable: PathBuf) -> ConverterBridge {
    ConverterBridge::new(BridgeOptions {
        executable: Some(executable),
        ..BridgeOptions::default()
    })
}

// ============================================================================
// Failure classification
// ============================================================================

#[test]
fn test_nonzero_exit_is_conversion_error_with_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = bridge_for(stub_converter(&dir, "echo partial output\necho boom >&2\nexit 1"));

    let result = bridge.convert(&ConversionRequest::text(b"{\\rtf1 x}", "rtf", "html"));
    match result {
        Err(err @ DocumentError::Conversion { .. }) => {
            assert!(err.to_string().contains("boom"), "got: {err}");
            let DocumentError::Conversion { status, stderr } = err else {
                unreachable!()
            };
            assert_eq!(status, Some(1));
            assert_eq!(stderr, "boom");
        }
        other => panic!("Expected Conversion error, got: {other:?}"),
    }
}

#[test]
fn test_killed_converter_is_conversion_error() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = bridge_for(stub_converter(&dir, "kill -9 $$"));

    match bridge.convert(&ConversionRequest::text(b"", "rtf", "html")) {
        Err(DocumentError::Conversion { status: None, .. }) => {}
        other => panic!("Expected signal-terminated Conversion error, got: {other:?}"),
    }
}

#[test]
fn test_undecodable_text_output_is_encoding_error() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = bridge_for(stub_converter(&dir, r"printf 'a\377b'"));

    match bridge.convert(&ConversionRequest::text(b"", "rtf", "html")) {
        Err(DocumentError::Encoding(_)) => {}
        other => panic!("Expected Encoding error, got: {other:?}"),
    }
}

#[test]
fn test_missing_executable_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = bridge_for(dir.path().join("does-not-exist"));

    match bridge.convert(&ConversionRequest::text(b"", "rtf", "html")) {
        Err(DocumentError::Io { path, .. }) => assert!(path.ends_with("does-not-exist")),
        other => panic!("Expected Io error, got: {other:?}"),
    }
}

// ============================================================================
// Output modes
// ============================================================================

#[test]
fn test_binary_mode_returns_bytes_unaltered() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = bridge_for(stub_converter(&dir, "cat"));

    // Every byte value, including ones that are never valid UTF-8
    let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
    let output = bridge
        .convert(&ConversionRequest::binary(&payload, "html", "docx"))
        .unwrap();

    assert_eq!(output, ConversionOutput::Binary(payload));
}

#[test]
fn test_text_mode_decodes_output() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = bridge_for(stub_converter(&dir, "cat"));

    let html = "<html><head><title>Café</title></head></html>";
    let output = bridge
        .convert(&ConversionRequest::text(html.as_bytes(), "rtf", "html"))
        .unwrap();

    assert_eq!(output, ConversionOutput::Text(html.to_string()));
}

#[test]
fn test_arguments_reach_converter_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = ConverterBridge::new(BridgeOptions {
        executable: Some(stub_converter(&dir, r#"printf '%s\n' "$@""#)),
        memory_limit_mb: 128,
        ..BridgeOptions::default()
    });

    let text = bridge
        .convert(&ConversionRequest::text(b"", "docbook", "html"))
        .unwrap()
        .into_text()
        .unwrap();

    let args: Vec<&str> = text.lines().collect();
    assert_eq!(args, vec![
        "+RTS", "-M128m", "-RTS", "--from", "docbook", "--to", "html", "--standalone"
    ]);
}

// ============================================================================
// Timeout
// ============================================================================

#[test]
fn test_hung_converter_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = ConverterBridge::new(BridgeOptions {
        executable: Some(stub_converter(&dir, "exec sleep 10")),
        timeout: Some(Duration::from_millis(200)),
        ..BridgeOptions::default()
    });

    let started = Instant::now();
    let result = bridge.convert(&ConversionRequest::text(b"", "rtf", "html"));

    match result {
        Err(DocumentError::Timeout(limit)) => assert_eq!(limit, Duration::from_millis(200)),
        other => panic!("Expected Timeout error, got: {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_timeout_reaches_converter_subprocesses() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = ConverterBridge::new(BridgeOptions {
        executable: Some(stub_converter(&dir, "sleep 10\necho late")),
        timeout: Some(Duration::from_millis(200)),
        ..BridgeOptions::default()
    });

    let started = Instant::now();
    match bridge.convert(&ConversionRequest::text(b"", "rtf", "html")) {
        Err(DocumentError::Timeout(_)) => {}
        other => panic!("Expected Timeout error, got: {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_fast_converter_within_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = ConverterBridge::new(BridgeOptions {
        executable: Some(stub_converter(&dir, "cat")),
        timeout: Some(Duration::from_secs(10)),
        ..BridgeOptions::default()
    });

    let output = bridge
        .convert(&ConversionRequest::text(b"<p>ok</p>", "rtf", "html"))
        .unwrap();
    assert_eq!(output.into_text().unwrap(), "<p>ok</p>");
}
