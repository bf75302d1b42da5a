//! Connectivity task against the simulated radio and NVS store.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use attendo::adapters::nvs::NvsAdapter;
use attendo::adapters::wifi::WifiRadio;
use attendo::config::DeviceConfig;
use attendo::provisioning::credentials::{self, Credentials};
use attendo::provisioning::portal::PortalRequest;
use attendo::state::StatusBoard;
use attendo::tasks::connectivity::{AP_TEARDOWN_GRACE, ConnState, ConnectivityTask};

use crate::mock_hw::no_wait;

fn task_with(config: &DeviceConfig, storage: NvsAdapter) -> (ConnectivityTask<WifiRadio, NvsAdapter>, Arc<StatusBoard>) {
    let board = Arc::new(StatusBoard::new(config.menu.len()));
    let mut radio = WifiRadio::new();
    radio.sim_add_network("home", "secret");
    (ConnectivityTask::new(radio, storage, board.clone(), config), board)
}

fn connected_task() -> (ConnectivityTask<WifiRadio, NvsAdapter>, Arc<StatusBoard>) {
    let mut storage = NvsAdapter::new().unwrap();
    credentials::save(&mut storage, &Credentials::new("home", "secret").unwrap()).unwrap();
    let (mut task, board) = task_with(&DeviceConfig::default(), storage);
    assert_eq!(task.tick(&mut no_wait), ConnState::Connected);
    (task, board)
}

#[test]
fn missing_credentials_provision_then_connect() {
    let (mut task, board) = task_with(&DeviceConfig::default(), NvsAdapter::new().unwrap());

    assert_eq!(task.tick(&mut no_wait), ConnState::Provisioning);
    let s = board.snapshot();
    assert!(s.provisioning);
    assert_eq!(s.ap_address, Some(Ipv4Addr::new(192, 168, 4, 1)));
    assert!(task.radio().sim_ap_up());

    task.radio_mut().sim_push_request(PortalRequest::get("/"));
    task.radio_mut()
        .sim_push_request(PortalRequest::post("/save", "ssid=home&password=secret"));
    assert_eq!(task.tick(&mut no_wait), ConnState::Disconnected);

    let responses = task.radio().sim_responses();
    assert_eq!(responses.len(), 2);
    assert!(responses[0].body.contains("<option value=\"home\">"));
    assert_eq!(responses[1].status, 200);
    assert!(!task.radio().sim_ap_up());
    assert!(!board.snapshot().provisioning);

    let stored = credentials::load(task.storage()).unwrap().unwrap();
    assert_eq!(stored, Credentials::new("home", "secret").unwrap());

    assert_eq!(task.tick(&mut no_wait), ConnState::Connected);
    assert!(board.snapshot().link_up);
}

#[test]
fn invalid_form_keeps_access_point_up() {
    let (mut task, _) = task_with(&DeviceConfig::default(), NvsAdapter::new().unwrap());
    task.tick(&mut no_wait);

    task.radio_mut().sim_push_request(PortalRequest::post("/save", "password=secret"));
    assert_eq!(task.tick(&mut no_wait), ConnState::Provisioning);
    assert_eq!(task.radio().sim_responses()[0].status, 400);
    assert!(task.radio().sim_ap_up());
    assert_eq!(credentials::load(task.storage()).unwrap(), None);
}

#[test]
fn link_loss_clears_session_within_one_tick() {
    let (mut task, board) = connected_task();
    assert!(board.set_session_up(true));

    task.radio_mut().sim_drop_network("home");
    assert_eq!(task.tick(&mut no_wait), ConnState::Disconnected);
    let s = board.snapshot();
    assert!(!s.link_up);
    assert!(!s.session_up);
}

#[test]
fn unreachable_network_falls_back_to_access_point() {
    let (mut task, board) = connected_task();
    task.radio_mut().sim_drop_network("home");
    task.tick(&mut no_wait);

    let mut waits = 0;
    let state = task.tick(&mut |d| {
        if !d.is_zero() {
            waits += 1;
        }
        true
    });
    assert_eq!(state, ConnState::Provisioning);
    assert_eq!(waits, DeviceConfig::default().link_attempts as usize);
    assert!(board.snapshot().provisioning);
    // Credentials survive a failed association.
    assert!(credentials::load(task.storage()).unwrap().is_some());
}

#[test]
fn without_ap_fallback_unreachable_network_keeps_retrying() {
    let mut config = DeviceConfig::default();
    config.features.provisioning_ap = false;
    let mut storage = NvsAdapter::new().unwrap();
    credentials::save(&mut storage, &Credentials::new("office", "hunter22").unwrap()).unwrap();
    let (mut task, board) = task_with(&config, storage);

    assert_eq!(task.tick(&mut no_wait), ConnState::Disconnected);
    assert_eq!(task.tick(&mut no_wait), ConnState::Disconnected);
    assert!(!board.snapshot().provisioning);
    assert!(!task.radio().sim_ap_up());
}

#[test]
fn reset_request_forgets_credentials_and_provisions() {
    let (mut task, board) = connected_task();
    board.request_provisioning();

    assert_eq!(task.tick(&mut no_wait), ConnState::Provisioning);
    let s = board.snapshot();
    assert!(!s.link_up);
    assert!(s.provisioning);
    assert!(!s.provisioning_requested);
    assert_eq!(credentials::load(task.storage()).unwrap(), None);
}

#[test]
fn cancelled_association_starts_over() {
    let (mut task, _) = task_with(&DeviceConfig::default(), {
        let mut storage = NvsAdapter::new().unwrap();
        credentials::save(&mut storage, &Credentials::new("office", "hunter22").unwrap()).unwrap();
        storage
    });
    assert_eq!(task.tick(&mut |_| false), ConnState::Disconnected);
}

#[test]
fn stored_utf8_ssid_connects() {
    let mut storage = NvsAdapter::new().unwrap();
    credentials::save(&mut storage, &Credentials::new("Café", "croissant").unwrap()).unwrap();
    let (mut task, board) = task_with(&DeviceConfig::default(), storage);
    task.radio_mut().sim_add_network("Café", "croissant");

    assert_eq!(task.tick(&mut no_wait), ConnState::Connected);
    assert!(board.snapshot().link_up);
}

/// Every yield of a pass feeds the watchdog in `run`; the longest stretch
/// between two yields is one retry, even over the whole retry budget.
#[test]
fn full_retry_budget_yields_once_per_retry() {
    let config = DeviceConfig {
        link_attempts: 30,
        link_retry_ms: 1000,
        ..DeviceConfig::default()
    };
    let mut storage = NvsAdapter::new().unwrap();
    credentials::save(&mut storage, &Credentials::new("office", "hunter22").unwrap()).unwrap();
    let (mut task, board) = task_with(&config, storage);

    let mut feeds: Vec<Duration> = Vec::new();
    let state = task.tick(&mut |d| {
        feeds.push(d);
        true
    });

    assert_eq!(state, ConnState::Provisioning);
    let retries = feeds.iter().filter(|d| !d.is_zero()).count();
    assert_eq!(retries, 30);
    assert!(feeds.iter().all(|d| *d <= config.link_retry()));
    // Scan and AP start each get their own feed after the last retry.
    assert!(feeds.iter().rev().take(2).all(|d| d.is_zero()));
    assert!(!board.snapshot().connecting);
}

#[test]
fn form_rescans_networks_on_every_get() {
    let (mut task, _) = task_with(&DeviceConfig::default(), NvsAdapter::new().unwrap());
    assert_eq!(task.tick(&mut no_wait), ConnState::Provisioning);

    task.radio_mut().sim_add_network("guest", "");
    task.radio_mut().sim_push_request(PortalRequest::get("/"));
    task.tick(&mut no_wait);

    let form = &task.radio().sim_responses()[0].body;
    assert!(form.contains("<option value=\"home\">"));
    assert!(form.contains("<option value=\"guest\">"));
}

#[test]
fn access_point_outlives_confirmation_page_by_grace() {
    let (mut task, _) = task_with(&DeviceConfig::default(), NvsAdapter::new().unwrap());
    task.tick(&mut no_wait);

    task.radio_mut()
        .sim_push_request(PortalRequest::post("/save", "ssid=home&password=secret"));
    let mut waited = Vec::new();
    assert_eq!(
        task.tick(&mut |d| {
            waited.push(d);
            true
        }),
        ConnState::Disconnected
    );
    assert_eq!(waited, [AP_TEARDOWN_GRACE]);
    assert_eq!(task.radio().sim_responses()[0].status, 200);
    assert!(!task.radio().sim_ap_up());
}

#[test]
fn board_shows_connecting_only_during_association() {
    let mut storage = NvsAdapter::new().unwrap();
    credentials::save(&mut storage, &Credentials::new("home", "secret").unwrap()).unwrap();
    let (mut task, board) = task_with(&DeviceConfig::default(), storage);

    let seen = board.clone();
    let mut connecting_while_waiting = false;
    task.radio_mut().sim_drop_network("home");
    task.tick(&mut |d| {
        if !d.is_zero() {
            connecting_while_waiting |= seen.snapshot().connecting;
        }
        true
    });
    assert!(connecting_while_waiting);
    assert!(!board.snapshot().connecting);

    task.radio_mut().sim_add_network("home", "secret");
    task.radio_mut().sim_push_request(PortalRequest::post("/save", "ssid=home&password=secret"));
    task.tick(&mut no_wait);
    assert_eq!(task.tick(&mut no_wait), ConnState::Connected);
    assert!(!board.snapshot().connecting);
}
