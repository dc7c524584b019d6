//! Session Tests
//!
//! These tests verify, against an in-process fake server:
//! - Lazy connect and request/response round trips
//! - Multi-chunk frames
//! - Exclusive access under concurrent callers
//! - Read-only guard
//! - Teardown and reconnect after connection failures
//! - Endpoint changes apply to the next connection only

#[path = "../common/mod.rs"]
mod common;

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel;
use lvdac::protocol::{Command, CommandName, ProtocolState, ResponseData};
use lvdac::{Config, DacError, Session};

use common::{command_name, command_params, FakePeer, Reply};

// =============================================================================
// Helper Functions
// =============================================================================

fn echo_position_peer() -> FakePeer {
    FakePeer::spawn(|request| match command_name(request) {
        "GetMotorPos" => Reply::frame("1.25"),
        "ListMotors" => Reply::frame("m1\r\nm2\r\nm3"),
        "MoveMotor" => Reply::frame("1"),
        _ => Reply::frame(""),
    })
}

fn get_pos(motor: &str) -> Command {
    Command::unary(CommandName::GetMotorPos, motor).unwrap()
}

/// A port with nothing listening on it
fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// =============================================================================
// Basic Exchange Tests
// =============================================================================

#[test]
fn test_connects_lazily() {
    let peer = echo_position_peer();
    let session = Session::new(peer.config());

    assert!(!session.is_connected());
    assert_eq!(peer.connections(), 0);

    let response = session.send(&get_pos("m1")).unwrap();
    assert_eq!(response.name(), CommandName::GetMotorPos);
    assert_eq!(response.data(), &ResponseData::Number(1.25));
    assert!(session.is_connected());
    assert_eq!(session.state(), ProtocolState::Idle);
    assert_eq!(peer.requests(), vec!["GetMotorPos(m1)"]);
}

#[test]
fn test_connection_is_reused() {
    let peer = echo_position_peer();
    let session = Session::new(peer.config());

    for _ in 0..5 {
        session.send(&get_pos("m1")).unwrap();
    }
    assert_eq!(peer.connections(), 1);
    assert_eq!(peer.requests().len(), 5);
}

#[test]
fn test_multi_chunk_array_frame() {
    let peer = FakePeer::spawn(|_| {
        Reply::Chunks(vec![
            b"2 Points by 3 chan".to_vec(),
            b"nels\r\n1\t2\t3\t".to_vec(),
            b"4\t5\t6".to_vec(),
            b"\r\n\r\n".to_vec(),
        ])
    });
    let session = Session::new(peer.config());

    let cmd = Command::unary(CommandName::GetInstrumentAcquired2D, "cam").unwrap();
    match session.send(&cmd).unwrap().into_data() {
        ResponseData::Array(array) => {
            assert_eq!(array.to_nested(), vec![vec![1, 2, 3], vec![4, 5, 6]])
        }
        other => panic!("Expected array, got {:?}", other),
    }
}

#[test]
fn test_small_read_chunks() {
    let peer = echo_position_peer();
    let config = Config {
        read_chunk_size: 2,
        ..peer.config()
    };
    let session = Session::new(config);

    let list = Command::nullary(CommandName::ListMotors).unwrap();
    assert_eq!(
        session.send(&list).unwrap().into_data(),
        ResponseData::List(vec!["m1".into(), "m2".into(), "m3".into()])
    );
}

#[test]
fn test_malformed_response_keeps_connection() {
    let peer = FakePeer::spawn(|request| match command_params(request).first().map(String::as_str) {
        Some("bad") => Reply::frame("not-a-number"),
        _ => Reply::frame("2"),
    });
    let session = Session::new(peer.config());

    let err = session.send(&get_pos("bad")).unwrap_err();
    assert!(matches!(err, DacError::MalformedResponse { .. }));
    assert!(!err.is_retry_safe(CommandName::GetMotorPos));
    assert!(session.is_connected());
    assert_eq!(session.state(), ProtocolState::Idle);

    assert_eq!(session.send(&get_pos("ok")).unwrap().data(), &ResponseData::Number(2.0));
    assert_eq!(peer.connections(), 1);
}

#[test]
fn test_short_binary_array_drops_connection() {
    let peer = FakePeer::spawn(|request| match command_name(request) {
        "GetInstrumentAcquired3D" => {
            // Body value happens to end in the terminator bytes
            let mut bytes = b"1 Points by 2 channels\r\n".to_vec();
            bytes.extend_from_slice(b"\r\n\r\n");
            Reply::Chunks(vec![bytes])
        }
        _ => Reply::frame("2"),
    });
    let session = Session::new(peer.config());

    let acquire = Command::unary(CommandName::GetInstrumentAcquired3D, "cam").unwrap();
    let err = session.send(&acquire).unwrap_err();
    assert!(matches!(err, DacError::MalformedResponse { .. }));
    assert!(!session.is_connected());
    assert_eq!(session.state(), ProtocolState::Idle);

    assert_eq!(session.send(&get_pos("m1")).unwrap().data(), &ResponseData::Number(2.0));
    assert_eq!(peer.connections(), 2);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_sends_never_interleave() {
    let peer = FakePeer::spawn(|request| {
        // Slow, fragmented reply to widen any race window
        let motor = command_params(request).pop().unwrap_or_default();
        Reply::Chunks(vec![
            motor.clone().into_bytes(),
            b"\r\n".to_vec(),
            b"\r\n".to_vec(),
        ])
    });
    let session = Arc::new(Session::new(peer.config()));
    let commands = vec![
        Command::unary(CommandName::GetInstrumentStatus, "a").unwrap(),
        Command::unary(CommandName::GetInstrumentStatus, "b").unwrap(),
        Command::unary(CommandName::GetInstrumentStatus, "c").unwrap(),
        Command::unary(CommandName::GetInstrumentStatus, "d").unwrap(),
    ];

    crossbeam::thread::scope(|s| {
        for cmd in &commands {
            let session = Arc::clone(&session);
            s.spawn(move |_| {
                for _ in 0..3 {
                    let response = session.send(cmd).unwrap();
                    // Each caller gets its own reply back
                    let expected = match &cmd.params()[0] {
                        lvdac::Param::Text(t) => t.clone(),
                        other => panic!("unexpected param {:?}", other),
                    };
                    assert_eq!(response.into_data(), ResponseData::List(vec![expected]));
                }
            });
        }
    })
    .unwrap();

    assert_eq!(peer.requests().len(), 12);
    assert_eq!(peer.violations(), 0);
    assert_eq!(peer.connections(), 1);
}

#[test]
fn test_send_timeout_gives_up_without_side_effect() {
    let (release_tx, release_rx) = channel::bounded::<()>(0);
    let (started_tx, started_rx) = channel::bounded::<()>(1);

    let peer = FakePeer::spawn(move |request| {
        if command_params(request).first().map(String::as_str) == Some("slow") {
            let _ = started_tx.send(());
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
        }
        Reply::frame("3")
    });
    let session = Arc::new(Session::new(peer.config()));

    crossbeam::thread::scope(|s| {
        let slow_session = Arc::clone(&session);
        let slow = s.spawn(move |_| slow_session.send(&get_pos("slow")));

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let err = session
            .send_timeout(&get_pos("impatient"), Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, DacError::SessionBusy));

        release_tx.send(()).unwrap();
        assert!(slow.join().unwrap().is_ok());
    })
    .unwrap();

    // The impatient request never reached the wire
    assert_eq!(peer.requests(), vec!["GetMotorPos(slow)"]);
    assert_eq!(
        session
            .send_timeout(&get_pos("later"), Duration::from_secs(5))
            .unwrap()
            .data(),
        &ResponseData::Number(3.0)
    );
}

// =============================================================================
// Read-only Guard Tests
// =============================================================================

#[test]
fn test_read_only_rejects_mutating_before_io() {
    let peer = echo_position_peer();
    let config = Config {
        read_only: true,
        ..peer.config()
    };
    let session = Session::new(config);

    let move_cmd = Command::binary(CommandName::MoveMotor, "m1", 5.0).unwrap();
    let err = session.send(&move_cmd).unwrap_err();
    assert!(matches!(
        err,
        DacError::PermissionDenied { command: CommandName::MoveMotor }
    ));
    assert!(!session.is_connected());
    assert_eq!(peer.connections(), 0);
    assert!(peer.requests().is_empty());

    // Reads still go through
    session.send(&get_pos("m1")).unwrap();
    assert_eq!(peer.requests(), vec!["GetMotorPos(m1)"]);
}

#[test]
fn test_read_only_toggle() {
    let peer = echo_position_peer();
    let session = Session::new(peer.config());
    let move_cmd = Command::binary(CommandName::MoveMotor, "m1", 5.0).unwrap();

    session.set_read_only(true);
    assert!(session.send(&move_cmd).is_err());

    session.set_read_only(false);
    assert_eq!(session.send(&move_cmd).unwrap().data(), &ResponseData::Bool(true));
    assert_eq!(peer.requests(), vec!["MoveMotor(m1, 5)"]);
}

#[test]
fn test_read_only_applies_to_queued_commands() {
    let (release_tx, release_rx) = channel::bounded::<()>(0);
    let (started_tx, started_rx) = channel::bounded::<()>(1);

    let peer = FakePeer::spawn(move |request| match command_name(request) {
        "GetMotorPos" => {
            let _ = started_tx.send(());
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
            Reply::frame("1.25")
        }
        _ => Reply::frame("1"),
    });
    let session = Arc::new(Session::new(peer.config()));

    crossbeam::thread::scope(|s| {
        let slow_session = Arc::clone(&session);
        let slow = s.spawn(move |_| slow_session.send(&get_pos("slow")));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // Queue the move behind the slow read, then turn the guard on
        let move_session = Arc::clone(&session);
        let queued = s.spawn(move |_| {
            let move_cmd = Command::binary(CommandName::MoveMotor, "m1", 5.0).unwrap();
            move_session.send(&move_cmd)
        });
        std::thread::sleep(Duration::from_millis(100));
        session.set_read_only(true);

        release_tx.send(()).unwrap();
        assert!(slow.join().unwrap().is_ok());
        assert!(matches!(
            queued.join().unwrap().unwrap_err(),
            DacError::PermissionDenied { command: CommandName::MoveMotor }
        ));
    })
    .unwrap();

    assert_eq!(peer.requests(), vec!["GetMotorPos(slow)"]);
    assert!(session.is_connected());
}

#[test]
fn test_stop_allowed_when_read_only() {
    let peer = FakePeer::spawn(|_| Reply::frame("OK!0 "));
    let session = Session::new(Config {
        read_only: true,
        ..peer.config()
    });

    let stop = Command::unary(CommandName::StopMotor, "m1").unwrap();
    assert_eq!(session.send(&stop).unwrap().data(), &ResponseData::Bool(true));
}

// =============================================================================
// Failure and Reconnect Tests
// =============================================================================

#[test]
fn test_reconnect_after_close_mid_exchange() {
    let calls = std::sync::atomic::AtomicUsize::new(0);
    let peer = FakePeer::spawn(move |_| {
        if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
            Reply::CloseAfter(b"12.".to_vec())
        } else {
            Reply::frame("12.5")
        }
    });
    let session = Session::new(peer.config());

    let err = session.send(&get_pos("m1")).unwrap_err();
    assert!(matches!(err, DacError::ConnectionClosed));
    assert!(err.is_retry_safe(CommandName::GetMotorPos));
    assert!(!err.is_retry_safe(CommandName::MoveMotor));
    assert!(!session.is_connected());
    assert_eq!(session.state(), ProtocolState::Idle);

    let response = session.send(&get_pos("m1")).unwrap();
    assert_eq!(response.data(), &ResponseData::Number(12.5));
    assert_eq!(session.state(), ProtocolState::Idle);
    assert_eq!(peer.connections(), 2);
}

#[test]
fn test_connect_refused_is_connection_error() {
    let session = Session::new(
        Config::builder()
            .host("127.0.0.1")
            .port(dead_port())
            .connect_timeout_ms(500)
            .build(),
    );

    let err = session.send(&get_pos("m1")).unwrap_err();
    assert!(err.is_connection_error(), "got {:?}", err);
    assert!(!session.is_connected());
    assert_eq!(session.state(), ProtocolState::Idle);
}

#[test]
fn test_read_timeout_tears_down() {
    let peer = FakePeer::spawn(|request| match command_params(request).first().map(String::as_str) {
        // Never finish the frame
        Some("hang") => Reply::Chunks(vec![b"1.0".to_vec()]),
        _ => Reply::frame("7"),
    });
    let session = Session::new(Config {
        read_timeout_ms: 200,
        ..peer.config()
    });

    let err = session.send(&get_pos("hang")).unwrap_err();
    assert!(matches!(err, DacError::Connection { .. }), "got {:?}", err);
    assert!(!session.is_connected());

    assert_eq!(session.send(&get_pos("m1")).unwrap().data(), &ResponseData::Number(7.0));
    assert_eq!(peer.connections(), 2);
}

#[test]
fn test_close_then_send_reconnects() {
    let peer = echo_position_peer();
    let session = Session::new(peer.config());

    session.send(&get_pos("m1")).unwrap();
    session.close();
    assert!(!session.is_connected());

    session.send(&get_pos("m1")).unwrap();
    assert_eq!(peer.connections(), 2);
}

// =============================================================================
// Endpoint Tests
// =============================================================================

#[test]
fn test_endpoint_change_applies_to_next_connection() {
    let first = FakePeer::spawn(|_| Reply::frame("1"));
    let second = FakePeer::spawn(|_| Reply::frame("2"));
    let session = Session::new(first.config());

    assert_eq!(session.send(&get_pos("m1")).unwrap().data(), &ResponseData::Number(1.0));

    // Open socket is untouched by the setter
    session.set_server_address("localhost");
    session.set_port(second.port());
    assert_eq!(session.server_address(), ("localhost".to_string(), second.port()));
    assert_eq!(session.send(&get_pos("m1")).unwrap().data(), &ResponseData::Number(1.0));

    session.close();
    session.set_server_address("127.0.0.1");
    assert_eq!(session.send(&get_pos("m1")).unwrap().data(), &ResponseData::Number(2.0));
    assert_eq!(first.connections(), 1);
    assert_eq!(second.connections(), 1);
}
