//! Session client driven through the dispatcher and real task threads.

use std::time::Duration;

use attendo::app::commands::Command;
use attendo::config::DeviceConfig;

use crate::mock_hw::{Terminal, fast_config, wait_until, TIMEOUT};

const ENROLL_7: &str = r#"{"action":"enroll","id":7}"#;
const CONFIRM_7: &str = r#"{"action":"enroll_confirm","id":7}"#;

#[test]
fn remote_enroll_runs_and_confirms_once() {
    let mut t = Terminal::new(&fast_config());
    t.connect();
    t.sensor.expect_enrollment();
    t.socket.inject(ENROLL_7);

    assert!(t.pump_until(|t| t.socket.sent().iter().any(|f| f == CONFIRM_7)));
    assert!(t.pump_until(|t| !t.dispatcher.enroll_running()));
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(t.socket.sent(), [CONFIRM_7]);
    assert_eq!(t.sensor.script().stored, [7]);
    assert!(!t.board.snapshot().sensor_busy);
}

#[test]
fn remote_enroll_outside_capacity_is_refused() {
    let mut t = Terminal::new(&fast_config());
    t.connect();
    t.socket.inject(r#"{"action":"enroll","id":500}"#);

    assert!(t.pump_until(|t| t.board.snapshot().activity.starts_with("Bad enroll id")));
    assert!(!t.dispatcher.enroll_running());
    assert!(t.sensor.script().stored.is_empty());
}

#[test]
fn unknown_and_malformed_frames_change_nothing() {
    let mut t = Terminal::new(&fast_config());
    t.connect();
    t.socket.inject(r#"{"action":"reboot"}"#);
    t.socket.inject("garbage");

    assert!(wait_until(TIMEOUT, || t.socket.log().inbound.is_empty()));
    t.dispatcher.drain(t.queue);
    assert!(t.queue.is_empty());
    assert!(!t.dispatcher.enroll_running());
    assert!(t.dispatcher.session_running());
}

#[test]
fn inbound_flood_is_rate_limited() {
    let mut t = Terminal::new(&fast_config());
    t.connect();
    // Ids past the capacity bound so no enrollment claims the sensor.
    for id in 0..12u16 {
        t.socket.inject(&format!(r#"{{"action":"enroll","id":{}}}"#, 1000 + id));
    }
    assert!(wait_until(TIMEOUT, || t.socket.log().inbound.is_empty()));

    let mut accepted = 0;
    while let Some(command) = t.queue.pop() {
        assert!(matches!(command, Command::Enroll { .. }));
        accepted += 1;
    }
    // Bucket starts full at four; a slow host may refill one or two.
    assert!((4..12).contains(&accepted), "accepted {accepted}");
}

#[test]
fn toggling_session_off_closes_socket() {
    let mut t = Terminal::new(&fast_config());
    t.connect();
    t.select_slot(0);

    assert!(!t.dispatcher.session_running());
    let s = t.board.snapshot();
    assert!(!s.session_up);
    assert_eq!(s.item_status[0].as_str(), "Off");
    assert!(!t.socket.log().connected);
}

#[test]
fn refused_connection_reports_unreachable() {
    let mut t = Terminal::new(&fast_config());
    t.board.set_link_up(true);
    t.socket.log().refuse = true;
    t.select_slot(0);

    assert!(t.pump_until(|t| !t.dispatcher.session_running()));
    let s = t.board.snapshot();
    assert!(!s.session_up);
    assert_eq!(s.activity.as_str(), "Server unreachable");
}

#[test]
fn session_needs_a_link() {
    let mut t = Terminal::new(&DeviceConfig::default());
    t.select_slot(0);

    assert!(t.pump_until(|t| !t.dispatcher.session_running()));
    assert!(!t.board.snapshot().session_up);
    assert!(!t.socket.log().connected);
}
