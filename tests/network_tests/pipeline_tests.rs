//! Pipeline Tests
//!
//! Tests for batched commands: reply ordering, the implicit drain on drop,
//! and failure mid-drain.

mod support;

use std::io::ErrorKind;

use resplink::network::{Connection, Pipeline};
use resplink::protocol::{encode_command, Command};
use resplink::{Config, RespError};
use support::{spawn_server, ScriptedTransport};

fn scripted() -> (Connection<ScriptedTransport>, ScriptedTransport) {
    let transport = ScriptedTransport::new();
    let conn = Connection::from_transport(transport.clone(), &Config::default());
    (conn, transport)
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_replies_in_submission_order() {
    let (mut conn, transport) = scripted();
    transport.push_read(b":1\r\n:2\r\n:3\r\n");

    let mut pipeline = conn.pipeline();
    for _ in 0..3 {
        pipeline.enqueue(&Command::new("INCR").arg("n")).unwrap();
    }
    assert_eq!(pipeline.outstanding(), 3);

    let values: Vec<i64> = pipeline
        .drain()
        .into_iter()
        .map(|r| r.unwrap().as_integer().unwrap())
        .collect();

    assert_eq!(values, vec![1, 2, 3]);
    assert_eq!(pipeline.outstanding(), 0);
}

#[test]
fn test_enqueue_writes_immediately() {
    let (mut conn, transport) = scripted();
    let a = Command::new("SET").arg("a").arg(1);
    let b = Command::new("GET").arg("a");

    let mut pipeline = Pipeline::new(&mut conn);
    pipeline.enqueue(&a).unwrap();
    pipeline.enqueue(&b).unwrap();

    let mut expected = encode_command(&a);
    expected.extend_from_slice(&encode_command(&b));
    assert_eq!(transport.written(), expected);

    transport.push_read(b"+OK\r\n$1\r\n1\r\n");
    pipeline.close();
}

#[test]
fn test_remote_error_occupies_its_slot() {
    let (mut conn, transport) = scripted();
    transport.push_read(b"+OK\r\n-ERR wrong\r\n:5\r\n");

    let mut pipeline = conn.pipeline();
    for _ in 0..3 {
        pipeline.enqueue(&Command::new("X")).unwrap();
    }
    let replies = pipeline.drain();

    assert_eq!(replies.len(), 3);
    let replies: Vec<_> = replies.into_iter().map(Result::unwrap).collect();
    assert_eq!(replies[0].as_status().unwrap(), "OK");
    assert_eq!(replies[1].as_error().as_deref(), Some("ERR wrong"));
    assert_eq!(replies[2].as_integer().unwrap(), 5);
}

#[test]
fn test_execute_fails_on_remote_error() {
    let (mut conn, transport) = scripted();
    transport.push_read(b"+OK\r\n-ERR wrong\r\n");

    let mut pipeline = conn.pipeline();
    pipeline.enqueue(&Command::new("A")).unwrap();
    pipeline.enqueue(&Command::new("B")).unwrap();

    assert_eq!(
        pipeline.execute().unwrap_err(),
        RespError::Remote("ERR wrong".to_string())
    );
    drop(pipeline);
    assert!(conn.is_open());
}

#[test]
fn test_empty_drain() {
    let (mut conn, transport) = scripted();

    let mut pipeline = conn.pipeline();
    assert!(pipeline.drain().is_empty());
    drop(pipeline);

    assert_eq!(transport.io_calls(), 0);
}

// =============================================================================
// Implicit Drain Tests
// =============================================================================

#[test]
fn test_drop_drains_outstanding_replies() {
    let (mut conn, transport) = scripted();
    transport.push_read(b"+OK\r\n+OK\r\n$4\r\nnext\r\n");

    {
        let mut pipeline = conn.pipeline();
        pipeline.enqueue(&Command::new("SET").arg("a").arg(1)).unwrap();
        pipeline.enqueue(&Command::new("SET").arg("b").arg(2)).unwrap();
    }

    // Without the implicit drain this would read the first +OK
    let reply = conn.send(&Command::new("GET").arg("c")).unwrap();
    assert_eq!(reply.as_string().unwrap(), "next");
}

#[test]
fn test_drop_after_partial_drain() {
    let (mut conn, transport) = scripted();
    transport.push_read(b":1\r\n");

    {
        let mut pipeline = conn.pipeline();
        pipeline.enqueue(&Command::new("INCR").arg("n")).unwrap();
        assert_eq!(pipeline.drain().len(), 1);
        pipeline.enqueue(&Command::new("INCR").arg("n")).unwrap();
        transport.push_read(b":2\r\n");
    }

    transport.push_read(b"+PONG\r\n");
    let reply = conn.send(&Command::new("PING")).unwrap();
    assert_eq!(reply.as_status().unwrap(), "PONG");
}

#[test]
fn test_drop_swallows_transport_error() {
    let (mut conn, transport) = scripted();
    transport.push_read(b"+OK\r\n");

    {
        let mut pipeline = conn.pipeline();
        pipeline.enqueue(&Command::new("A")).unwrap();
        pipeline.enqueue(&Command::new("B")).unwrap();
        // Second reply never arrives; dropping must not panic
    }

    assert!(!conn.is_open());
    assert!(matches!(conn.send(&Command::new("PING")), Err(RespError::Poisoned(_))));
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_failure_mid_drain_fills_remaining_slots() {
    let (mut conn, transport) = scripted();
    transport.push_read(b"+OK\r\n");
    transport.push_error(ErrorKind::ConnectionReset);

    let mut pipeline = conn.pipeline();
    for _ in 0..4 {
        pipeline.enqueue(&Command::new("X")).unwrap();
    }
    let replies = pipeline.drain();

    assert_eq!(replies.len(), 4);
    assert!(replies[0].is_ok());
    for slot in &replies[1..] {
        assert!(matches!(slot, Err(RespError::ConnectionLost(_))));
    }
    assert_eq!(pipeline.outstanding(), 0);
}

#[test]
fn test_enqueue_after_failure_is_poisoned() {
    let (mut conn, transport) = scripted();
    transport.fail_writes(ErrorKind::BrokenPipe);

    let mut pipeline = conn.pipeline();
    assert!(matches!(
        pipeline.enqueue(&Command::new("A")),
        Err(RespError::ConnectionLost(_))
    ));
    assert_eq!(pipeline.outstanding(), 0);
    assert!(matches!(
        pipeline.enqueue(&Command::new("B")),
        Err(RespError::Poisoned(_))
    ));
}

// =============================================================================
// TCP Tests
// =============================================================================

#[test]
fn test_pipeline_over_loopback() {
    let (addr, _received, server) =
        spawn_server(vec![&b"+OK\r\n"[..], b":7\r\n", b"*2\r\n$1\r\na\r\n$1\r\nb\r\n"]);
    let mut conn = Connection::connect(addr).unwrap();

    let mut pipeline = conn.pipeline();
    pipeline.enqueue(&Command::new("SET").arg("n").arg(6)).unwrap();
    pipeline.enqueue(&Command::new("INCR").arg("n")).unwrap();
    pipeline.enqueue(&Command::new("KEYS").arg("*")).unwrap();
    let replies = pipeline.execute().unwrap();

    assert_eq!(replies[1].as_integer().unwrap(), 7);
    assert_eq!(replies[2].as_string_array().unwrap(), vec!["a", "b"]);

    drop(pipeline);
    drop(conn);
    server.join().unwrap();
}
