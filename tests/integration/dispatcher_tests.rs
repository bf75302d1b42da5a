//! Menu input through the command queue, and board variants.

use std::sync::Arc;
use std::time::Duration;

use attendo::adapters::nvs::NvsAdapter;
use attendo::adapters::wifi::WifiRadio;
use attendo::app::commands::Command;
use attendo::config::DeviceConfig;
use attendo::drivers::button::DebouncedButton;
use attendo::menu::MenuAction;
use attendo::provisioning::credentials::{self, Credentials};
use attendo::tasks::CancelToken;
use attendo::tasks::connectivity::{ConnState, ConnectivityTask};

use crate::mock_hw::{Terminal, fast_config, no_wait, wait_until, TIMEOUT};

#[test]
fn button_edges_drive_the_menu() {
    let mut t = Terminal::new(&fast_config());
    let advance = DebouncedButton::new(Command::Advance);
    let select = DebouncedButton::new(Command::Select);

    // The cursor moves up and wraps: 0 -> 2 -> 1.
    assert!(advance.on_falling_edge(1_000, t.queue));
    // Contact bounce.
    assert!(!advance.on_falling_edge(1_010, t.queue));
    assert!(advance.on_falling_edge(1_200, t.queue));
    t.dispatcher.drain(t.queue);
    assert_eq!(t.board.selected(), 1);

    assert!(select.on_falling_edge(1_400, t.queue));
    t.dispatcher.drain(t.queue);
    assert!(t.pump_until(|t| !t.dispatcher.match_running()));
    assert_eq!(t.board.snapshot().activity.as_str(), "Connect to server");
}

#[test]
fn cursor_wraps_over_configured_items() {
    let mut t = Terminal::new(&DeviceConfig::provisioning_only());
    for expected in [1, 0, 1] {
        t.dispatcher.handle(Command::Advance);
        assert_eq!(t.board.selected(), expected);
    }
}

#[test]
fn board_without_sensor_refuses_enrollment() {
    let mut t = Terminal::new(&DeviceConfig::provisioning_only());
    assert_eq!(t.dispatcher.menu(), [MenuAction::ToggleSession, MenuAction::ResetWifi]);

    t.dispatcher.handle(Command::Enroll { id: 1 });
    assert!(!t.dispatcher.enroll_running());
    assert!(t.sensor.script().stored.is_empty());
}

#[test]
fn slot_status_follows_tasks() {
    let mut t = Terminal::new(&fast_config());
    let status = |t: &Terminal| {
        let s = t.board.snapshot();
        s.item_status.iter().map(|x| x.to_string()).collect::<Vec<_>>()
    };
    assert_eq!(status(&t), ["Off", "Off", ""]);

    t.connect();
    t.select_slot(1);
    assert_eq!(status(&t), ["On", "On", ""]);
}

#[test]
fn wifi_reset_hands_over_to_connectivity() {
    let config = fast_config();
    let mut t = Terminal::new(&config);

    let mut storage = NvsAdapter::new().unwrap();
    credentials::save(&mut storage, &Credentials::new("home", "secret").unwrap()).unwrap();
    let mut radio = WifiRadio::new();
    radio.sim_add_network("home", "secret");
    let mut wifi = ConnectivityTask::new(radio, storage, Arc::clone(&t.board), &config);
    assert_eq!(wifi.tick(&mut no_wait), ConnState::Connected);

    t.select_slot(0);
    assert!(wait_until(TIMEOUT, || t.board.snapshot().session_up));

    t.select_slot(2);
    assert!(!t.dispatcher.session_running());
    assert_eq!(t.board.snapshot().activity.as_str(), "WiFi reset");

    assert_eq!(wifi.tick(&mut no_wait), ConnState::Provisioning);
    let s = t.board.snapshot();
    assert!(s.provisioning);
    assert!(!s.link_up);
    assert_eq!(credentials::load(wifi.storage()).unwrap(), None);
}

#[test]
fn sleep_item_is_reported_unavailable() {
    let mut config = fast_config();
    config.menu.clear();
    config.menu.push(MenuAction::ToggleSession).unwrap();
    config.menu.push(MenuAction::Sleep).unwrap();
    let mut t = Terminal::new(&config);

    t.select_slot(1);
    assert_eq!(t.board.snapshot().activity.as_str(), "Sleep not available");
}

#[test]
fn dispatcher_loop_runs_until_cancelled() {
    let t = Terminal::new(&fast_config());
    let queue = t.queue;
    let board = Arc::clone(&t.board);
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let dispatcher = t.dispatcher;
    let join = std::thread::spawn(move || dispatcher.run(queue, Duration::from_millis(5), &token, || {}));

    assert!(queue.push(Command::Advance));
    assert!(wait_until(TIMEOUT, || board.selected() == 2));
    cancel.cancel();
    join.join().unwrap();
}
