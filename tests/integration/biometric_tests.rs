//! Match and enroll workflows on task threads, sharing one sensor.

use std::time::Duration;

use attendo::app::commands::Command;
use attendo::app::dispatcher::Launcher;
use attendo::error::Error;

use crate::mock_hw::{Terminal, fast_config, wait_until, TIMEOUT};

const MATCH_SLOT: usize = 1;

fn attendance(id: u16) -> String {
    format!(r#"{{"action":"attendance","id":{id}}}"#)
}

fn matching_terminal() -> Terminal {
    let mut t = Terminal::new(&fast_config());
    t.connect();
    t.select_slot(MATCH_SLOT);
    assert!(t.dispatcher.match_running());
    assert!(t.board.snapshot().sensor_busy);
    t
}

#[test]
fn match_reports_attendance_then_drops_events_while_offline() {
    let mut t = matching_terminal();

    t.sensor.present(3, 80);
    assert!(wait_until(TIMEOUT, || t.socket.sent() == [attendance(3)]));
    assert_eq!(t.board.snapshot().activity.as_str(), "Welcome #3");

    // Link drops: the session ends on its own, match keeps scanning.
    t.board.set_link_up(false);
    assert!(t.pump_until(|t| !t.dispatcher.session_running()));
    assert!(t.dispatcher.match_running());

    t.sensor.present(4, 90);
    assert!(wait_until(TIMEOUT, || t.sensor.script().searches.is_empty()));
    std::thread::sleep(Duration::from_millis(50));
    assert!(t.outbox.is_empty());

    t.board.set_link_up(true);
    t.select_slot(0);
    assert!(wait_until(TIMEOUT, || t.board.snapshot().session_up));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(t.socket.sent(), [attendance(3)]);
}

#[test]
fn confidence_must_exceed_threshold() {
    let mut t = matching_terminal();

    t.sensor.present(5, 50);
    t.sensor.present(6, 51);
    assert!(wait_until(TIMEOUT, || !t.socket.sent().is_empty()));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(t.socket.sent(), [attendance(6)]);
}

#[test]
fn match_without_session_stops_itself() {
    let mut t = Terminal::new(&fast_config());
    t.select_slot(MATCH_SLOT);

    assert!(t.pump_until(|t| !t.dispatcher.match_running()));
    let s = t.board.snapshot();
    assert_eq!(s.activity.as_str(), "Connect to server");
    assert!(!s.sensor_busy);
}

#[test]
fn enroll_preempts_match_and_frees_the_sensor() {
    let mut t = matching_terminal();
    t.dispatcher.handle(Command::Enroll { id: 9 });
    // Scripted only now so the match task cannot consume the touches.
    t.sensor.expect_enrollment();

    assert!(!t.dispatcher.match_running());
    assert!(t.dispatcher.enroll_running());
    assert!(t.pump_until(|t| !t.dispatcher.enroll_running()));
    assert_eq!(t.sensor.script().stored, [9]);
    assert!(!t.board.snapshot().sensor_busy);
    assert_eq!(t.board.snapshot().item_status[MATCH_SLOT].as_str(), "Off");
}

#[test]
fn failed_enrollment_reports_nothing() {
    let mut t = Terminal::new(&fast_config());
    t.connect();
    // Finger placed and never lifted.
    t.sensor.script().captures.extend(std::iter::repeat_n(Ok(()), 1000));
    t.dispatcher.handle(Command::Enroll { id: 2 });

    assert!(t.pump_until(|t| !t.dispatcher.enroll_running()));
    assert_eq!(t.board.snapshot().activity.as_str(), "Enroll failed: finger not lifted");
    assert!(t.sensor.script().stored.is_empty());
    std::thread::sleep(Duration::from_millis(50));
    assert!(t.socket.sent().is_empty());
}

#[test]
fn sensor_has_one_owner_at_a_time() {
    let mut t = matching_terminal();
    let launcher = t.dispatcher.launcher_mut();
    assert!(matches!(launcher.start_match(), Err(Error::SensorBusy)));
    assert!(matches!(launcher.start_enroll(1), Err(Error::SensorBusy)));
}
