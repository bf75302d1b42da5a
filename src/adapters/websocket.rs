//! WebSocket transport to the collector.
//!
//! - **`target_os = "espidf"`**: `EspWebSocketClient`.  Its event callback
//!   runs on the client's own task and only forwards [`SocketEvent`]s into a
//!   channel that [`SocketTransport::poll`] drains.
//! - **all other targets**: a loopback socket that records sent frames and
//!   replays injected ones.

use log::info;

use crate::app::ports::{SocketEvent, SocketTransport};
use crate::error::SessionError;

#[cfg(target_os = "espidf")]
mod platform {
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::Duration;

    use esp_idf_svc::io::EspIOError;
    use esp_idf_svc::ws::FrameType;
    use esp_idf_svc::ws::client::{
        EspWebSocketClient, EspWebSocketClientConfig, WebSocketEvent, WebSocketEventType,
    };
    use log::warn;

    use super::*;

    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    #[derive(Default)]
    pub struct WebSocketTransport {
        client: Option<EspWebSocketClient<'static>>,
        events: Option<Receiver<SocketEvent>>,
    }

    impl WebSocketTransport {
        pub fn new() -> Self {
            Self::default()
        }
    }

    fn forward(tx: &Sender<SocketEvent>, event: &Result<WebSocketEvent<'_>, EspIOError>) {
        let mapped = match event {
            Ok(event) => match event.event_type {
                WebSocketEventType::Connected => Some(SocketEvent::Connected),
                WebSocketEventType::Disconnected | WebSocketEventType::Closed => Some(SocketEvent::Disconnected),
                WebSocketEventType::Text(text) => Some(SocketEvent::Text(text.to_owned())),
                _ => None,
            },
            Err(e) => {
                warn!("Socket(espidf): {:?}", e);
                None
            }
        };
        if let Some(event) = mapped {
            let _ = tx.send(event);
        }
    }

    impl SocketTransport for WebSocketTransport {
        fn connect(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
            let uri = format!("ws://{host}:{port}/");
            let (tx, rx) = mpsc::channel();
            let client = EspWebSocketClient::new(
                &uri,
                &EspWebSocketClientConfig::default(),
                CONNECT_TIMEOUT,
                move |event| forward(&tx, event),
            )
            .map_err(|e| {
                warn!("Socket(espidf): connect to {} failed: {:?}", uri, e);
                SessionError::ConnectFailed
            })?;
            info!("Socket(espidf): opened {}", uri);
            self.client = Some(client);
            self.events = Some(rx);
            Ok(())
        }

        fn close(&mut self) {
            // Dropping the client closes the connection and stops its task.
            self.client = None;
            self.events = None;
        }

        fn send_text(&mut self, frame: &str) -> Result<(), SessionError> {
            let client = self.client.as_mut().ok_or(SessionError::NotConnected)?;
            client
                .send(FrameType::Text(false), frame.as_bytes())
                .map_err(|_| SessionError::SendFailed)
        }

        fn poll(&mut self) -> Option<SocketEvent> {
            self.events.as_ref()?.try_recv().ok()
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod platform {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Debug, Default)]
    pub struct WebSocketTransport {
        open: bool,
        sent: Vec<String>,
        inbox: VecDeque<SocketEvent>,
    }

    impl WebSocketTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sim_inject(&mut self, event: SocketEvent) {
            self.inbox.push_back(event);
        }

        pub fn sim_sent(&self) -> &[String] {
            &self.sent
        }
    }

    impl SocketTransport for WebSocketTransport {
        fn connect(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
            info!("Socket(sim): open ws://{}:{}/", host, port);
            self.open = true;
            self.inbox.push_back(SocketEvent::Connected);
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
            self.inbox.clear();
        }

        fn send_text(&mut self, frame: &str) -> Result<(), SessionError> {
            if !self.open {
                return Err(SessionError::NotConnected);
            }
            self.sent.push(frame.to_owned());
            Ok(())
        }

        fn poll(&mut self) -> Option<SocketEvent> {
            self.inbox.pop_front()
        }
    }
}

pub use platform::WebSocketTransport;

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn connect_reports_connected_then_carries_frames() {
        let mut ws = WebSocketTransport::new();
        assert_eq!(ws.send_text("x"), Err(SessionError::NotConnected));
        ws.connect("collector.local", 8080).unwrap();
        assert_eq!(ws.poll(), Some(SocketEvent::Connected));
        ws.send_text(r#"{"action":"attendance","id":1}"#).unwrap();
        assert_eq!(ws.sim_sent().len(), 1);
        ws.close();
        assert_eq!(ws.send_text("x"), Err(SessionError::NotConnected));
    }
}
