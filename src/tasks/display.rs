//! Display refresh task.
//!
//! Pure reader: takes a board snapshot every ~100 ms, composes a text frame
//! and hands it to the [`DisplayPort`].  Two layouts:
//!
//! ```text
//!   normal                      provisioning
//!   ┌─────────────────────┐     ┌─────────────────────┐
//!   │WiFi:up     Bat: 76% │     │Bat: 76%             │
//!   │>Server     Running  │     │Access Point Mode    │
//!   │ Attendance Idle     │     │SSID: ESP32-AP       │
//!   │ Reset WiFi          │     │IP: 192.168.4.1      │
//!   │ID 3 matched         │     └─────────────────────┘
//!   └─────────────────────┘
//! ```
//!
//! While an association is in progress the menu is replaced by a
//! "Connecting to WiFi..." banner.

use core::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::app::ports::DisplayPort;
use crate::config::DeviceConfig;
use crate::menu::MenuAction;
use crate::state::{StatusBoard, StatusSnapshot};
use crate::tasks::CancelToken;

/// Character columns shown per row of the 128×64 panel.
pub const PANEL_COLS: usize = 21;
/// Text rows of the panel.
pub const PANEL_ROWS: usize = 8;

pub type DisplayLine = heapless::String<PANEL_COLS>;
pub type Frame = heapless::Vec<DisplayLine, PANEL_ROWS>;

/// Format into a line, silently clipping at the panel width.
fn line(args: core::fmt::Arguments<'_>) -> DisplayLine {
    let mut full: heapless::String<64> = heapless::String::new();
    let _ = full.write_fmt(args);
    crate::config::fixed_str(full.as_str().trim_end())
}

fn battery_text(s: &StatusSnapshot) -> heapless::String<12> {
    let mut out = heapless::String::new();
    let _ = write!(out, "Bat:{:>3.0}%", s.battery_percent);
    if s.battery_low {
        let _ = out.push('!');
    }
    out
}

/// Compose the frame for one snapshot.
pub fn compose_frame(s: &StatusSnapshot, menu: &[MenuAction], ap_ssid: &str) -> Frame {
    let mut frame = Frame::new();

    if s.provisioning {
        let _ = frame.push(line(format_args!("{}", battery_text(s))));
        let _ = frame.push(line(format_args!("Access Point Mode")));
        let _ = frame.push(line(format_args!("SSID: {}", ap_ssid)));
        if let Some(ip) = s.ap_address {
            let _ = frame.push(line(format_args!("IP: {}", ip)));
        }
        return frame;
    }

    if s.connecting {
        let _ = frame.push(line(format_args!("{}", battery_text(s))));
        let _ = frame.push(line(format_args!("Connecting to WiFi...")));
        return frame;
    }

    let glyph = match (s.link_up, s.session_up) {
        (true, true) => "WiFi:up+srv",
        (true, false) => "WiFi:up",
        (false, _) => "WiFi:--",
    };
    let _ = frame.push(line(format_args!("{:<12}{}", glyph, battery_text(s))));

    for (slot, action) in menu.iter().enumerate() {
        let cursor = if slot == s.selected { '>' } else { ' ' };
        let status = s.item_status.get(slot).map_or("", |t| t.as_str());
        let _ = frame.push(line(format_args!("{}{:<10} {}", cursor, action.label(), status)));
    }

    if !s.activity.is_empty() {
        let _ = frame.push(line(format_args!("{}", s.activity)));
    }
    frame
}

pub struct DisplayTask<D> {
    panel: D,
    board: Arc<StatusBoard>,
    menu: heapless::Vec<MenuAction, { crate::config::MAX_MENU_ITEMS }>,
    ap_ssid: heapless::String<32>,
    period: Duration,
    last: Option<Frame>,
}

impl<D: DisplayPort> DisplayTask<D> {
    pub fn new(panel: D, board: Arc<StatusBoard>, config: &DeviceConfig) -> Self {
        Self {
            panel,
            board,
            menu: config.menu.clone(),
            ap_ssid: config.ap_ssid.clone(),
            period: Duration::from_millis(config.display_refresh_ms as u64),
            last: None,
        }
    }

    /// Render once.  Returns `true` if the panel was redrawn.
    pub fn refresh(&mut self) -> bool {
        let frame = compose_frame(&self.board.snapshot(), &self.menu, &self.ap_ssid);
        if self.last.as_ref() == Some(&frame) {
            return false;
        }
        self.panel.show(&frame);
        self.last = Some(frame);
        true
    }

    pub fn run(mut self, cancel: &CancelToken) {
        loop {
            self.refresh();
            if !cancel.sleep(self.period) {
                return;
            }
        }
    }

    pub fn panel(&self) -> &D {
        &self.panel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn menu() -> Vec<MenuAction> {
        vec![MenuAction::ToggleSession, MenuAction::ToggleMatch, MenuAction::ResetWifi]
    }

    #[test]
    fn normal_layout_marks_selected_slot() {
        let board = StatusBoard::new(3);
        board.set_link_up(true);
        board.set_battery(76.4, false);
        board.set_item_status(0, "Running");
        board.set_activity("ID 3 matched");
        board.advance_cursor(); // 0 -> 2

        let frame = compose_frame(&board.snapshot(), &menu(), "ESP32-AP");
        assert_eq!(frame[0].as_str(), "WiFi:up     Bat: 76%");
        assert_eq!(frame[1].as_str(), " Server     Running");
        assert!(frame[3].starts_with(">Reset WiFi"));
        assert_eq!(frame.last().unwrap().as_str(), "ID 3 matched");
    }

    #[test]
    fn provisioning_layout_shows_ap_address() {
        let board = StatusBoard::new(3);
        board.set_provisioning(Some(Ipv4Addr::new(192, 168, 4, 1)));
        let frame = compose_frame(&board.snapshot(), &menu(), "ESP32-AP");
        assert_eq!(frame[1].as_str(), "Access Point Mode");
        assert_eq!(frame[2].as_str(), "SSID: ESP32-AP");
        assert_eq!(frame[3].as_str(), "IP: 192.168.4.1");
    }

    #[test]
    fn connecting_banner_replaces_menu() {
        let board = StatusBoard::new(3);
        board.set_connecting(true);
        let frame = compose_frame(&board.snapshot(), &menu(), "ESP32-AP");
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[1].as_str(), "Connecting to WiFi...");

        board.set_link_up(true);
        let frame = compose_frame(&board.snapshot(), &menu(), "ESP32-AP");
        assert!(frame[0].starts_with("WiFi:up"));
    }

    #[test]
    fn lines_are_clipped_to_panel_width() {
        let board = StatusBoard::new(3);
        board.set_activity("a very long activity line that overflows");
        let frame = compose_frame(&board.snapshot(), &menu(), "x");
        assert!(frame.iter().all(|l| l.len() <= PANEL_COLS));
    }

    #[test]
    fn low_battery_is_flagged() {
        let board = StatusBoard::new(3);
        board.set_battery(9.0, true);
        let frame = compose_frame(&board.snapshot(), &menu(), "x");
        assert!(frame[0].ends_with("Bat:  9%!"));
    }

    struct CountingPanel(usize);

    impl DisplayPort for CountingPanel {
        fn show(&mut self, _frame: &Frame) {
            self.0 += 1;
        }
    }

    #[test]
    fn unchanged_frame_is_not_redrawn() {
        let board = Arc::new(StatusBoard::new(3));
        let mut task = DisplayTask::new(CountingPanel(0), board.clone(), &DeviceConfig::default());
        assert!(task.refresh());
        assert!(!task.refresh());
        board.set_activity("changed");
        assert!(task.refresh());
        assert_eq!(task.panel().0, 2);
    }
}
