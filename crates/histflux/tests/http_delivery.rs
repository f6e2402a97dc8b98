// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// HTTP delivery against a local capture server: request shape, redirects,
// and the distinct failure classes.

mod support;

use std::borrow::Cow;
use std::time::Duration;

use histflux::{
    DataType, DeliveryError, Destination, Destinations, ExportError, Exporter, FloatRecord,
    HttpWriter, LogRecord, Timestamp, Transport,
};
use support::{CapturedRequest, Reply};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn destination(url: &str) -> Destination {
    Destination {
        url: Some(url.to_string()),
        org: Some("o".to_string()),
        bucket: Some("b".to_string()),
        token: Some("t".to_string()),
    }
}

fn fast_writer() -> HttpWriter {
    HttpWriter::with_timeouts(Duration::from_millis(500), Duration::from_millis(500))
}

#[test]
fn test_post_request_shape() {
    let (base, requests) = support::spawn(|_| Reply::Status(204, ""));
    let writer = HttpWriter::new();

    let body = b"history,itemid=42 value=3.140000 1700000000000000500\n".to_vec();
    writer
        .write(&destination(&base), body.clone())
        .expect("write succeeds");

    let request: CapturedRequest = requests.recv_timeout(RECV_TIMEOUT).expect("request captured");
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/api/v2/write?org=o&bucket=b");
    assert_eq!(request.header("authorization"), Some("Token t"));
    assert_eq!(
        request.header("content-type"),
        Some("text/plain; charset=utf-8")
    );
    assert_eq!(request.header("accept"), Some("application/json"));
    assert_eq!(request.header("transfer-encoding"), None);
    assert_eq!(request.body, body);
}

#[test]
fn test_sequential_writes_share_writer() {
    let (base, requests) = support::spawn(|_| Reply::Status(204, ""));
    let writer = HttpWriter::new();

    for i in 0..3 {
        writer
            .write(&destination(&base), format!("history,itemid={} value=1 1\n", i).into_bytes())
            .expect("write succeeds");
    }

    for i in 0..3 {
        let request = requests.recv_timeout(RECV_TIMEOUT).expect("request captured");
        assert_eq!(request.body, format!("history,itemid={} value=1 1\n", i).into_bytes());
    }
}

#[test]
fn test_redirect_is_followed() {
    let (base, requests) = support::spawn(|request| {
        if request.target.starts_with("/old") {
            Reply::Redirect("/api/v2/write?org=o&bucket=b".to_string())
        } else {
            Reply::Status(204, "")
        }
    });
    let writer = HttpWriter::new();

    writer
        .write(&destination(&format!("{}/old", base)), b"m,itemid=1 value=1 1\n".to_vec())
        .expect("write succeeds after redirect");

    let first = requests.recv_timeout(RECV_TIMEOUT).expect("first request");
    assert_eq!(first.target, "/old/api/v2/write?org=o&bucket=b");
    let second = requests.recv_timeout(RECV_TIMEOUT).expect("redirected request");
    assert_eq!(second.method, "POST");
    assert_eq!(second.target, "/api/v2/write?org=o&bucket=b");
    assert_eq!(second.body, b"m,itemid=1 value=1 1\n");
}

#[test]
fn test_rejected_write_carries_influx_message() {
    let (base, _requests) = support::spawn(|_| {
        Reply::Status(
            400,
            r#"{"code":"invalid","message":"unable to parse 'garbage'"}"#,
        )
    });
    let writer = HttpWriter::new();

    match writer.write(&destination(&base), b"garbage\n".to_vec()) {
        Err(DeliveryError::Rejected { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid: unable to parse 'garbage'");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[test]
fn test_silent_server_times_out() {
    let (base, _requests) = support::spawn(|_| Reply::Silent);
    let writer = fast_writer();

    let err = writer
        .write(&destination(&base), b"m,itemid=1 value=1 1\n".to_vec())
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {:?}", err);
}

#[test]
fn test_refused_connection_is_transport_error() {
    let writer = fast_writer();

    let err = writer
        .write(&destination(&support::closed_port()), b"m,itemid=1 value=1 1\n".to_vec())
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Transport(_)), "got {:?}", err);
    assert!(!err.is_timeout());
}

#[test]
fn test_missing_bucket_fails_before_sending() {
    let (base, requests) = support::spawn(|_| Reply::Status(204, ""));
    let writer = HttpWriter::new();
    let mut dest = destination(&base);
    dest.bucket = None;

    let err = writer.write(&dest, b"m value=1 1\n".to_vec()).unwrap_err();
    assert!(err.is_setup());
    assert!(requests.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_exporter_end_to_end() {
    let (base, requests) = support::spawn(|_| Reply::Status(204, ""));
    let destinations = Destinations::from_fn(|data_type| match data_type {
        DataType::Log => destination(&base),
        _ => Destination::default(),
    });
    let exporter = Exporter::new(destinations, HttpWriter::new());

    let records = vec![
        LogRecord {
            itemid: 10,
            timestamp: Timestamp::new(1_700_000_000, 1),
            value: Cow::Borrowed("Login failed for \"admin\""),
            source: Cow::Borrowed("sshd"),
            log_timestamp: 1_699_999_999,
            logeventid: 0,
            severity: 3,
        },
        LogRecord {
            itemid: 11,
            timestamp: Timestamp::new(1_700_000_000, 2),
            value: Cow::Borrowed("C:\\Windows"),
            source: Cow::Borrowed(""),
            log_timestamp: 0,
            logeventid: 4625,
            severity: 1,
        },
    ];
    assert_eq!(exporter.export(records.iter()).expect("export"), 2);

    let request = requests.recv_timeout(RECV_TIMEOUT).expect("request captured");
    assert_eq!(
        String::from_utf8(request.body).unwrap(),
        "history_log,itemid=10 value=\"Login failed for \\\"admin\\\"\",source=\"sshd\",\
         timestamp=1699999999,logeventid=0,severity=3 1700000000000000001\n\
         history_log,itemid=11 value=\"C:\\\\Windows\",source=\"\",\
         timestamp=0,logeventid=4625,severity=1 1700000000000000002\n"
    );

    let err = exporter
        .export([FloatRecord {
            itemid: 1,
            timestamp: Timestamp::new(1, 0),
            value: 1.0,
        }])
        .unwrap_err();
    assert!(matches!(err, ExportError::NotExported(DataType::Float)));
}

#[test]
fn test_exporter_dispatch_survives_timeout() {
    let (base, _requests) = support::spawn(|_| Reply::Silent);
    let destinations = Destinations::from_fn(|_| destination(&base));
    let exporter = Exporter::new(destinations, fast_writer());

    exporter.dispatch([FloatRecord {
        itemid: 1,
        timestamp: Timestamp::new(1, 0),
        value: 1.0,
    }]);

    let stats = exporter.stats();
    assert_eq!(stats.batches_failed, 1);
    assert_eq!(stats.batches_delivered, 0);
}
