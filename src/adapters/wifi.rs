//! WiFi radio adapter.
//!
//! Implements [`LinkPort`] (station mode) and [`ProvisioningPort`] (access
//! point plus the captive HTTP form) on one radio, since the ESP32 modem
//! can only be owned once.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspWifi` for the radio and `EspHttpServer`
//!   for the form.  HTTP handlers run on the server's own thread; each one
//!   forwards its request over a channel and blocks until the connectivity
//!   task answers through [`ProvisioningPort::respond`].
//! - **all other targets**: an in-memory radio with a table of reachable
//!   networks and a scripted request queue, for host-side runs.

use std::net::Ipv4Addr;

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{LinkPort, ProvisioningPort};
use crate::error::LinkError;
use crate::provisioning::credentials::Credentials;
use crate::provisioning::portal::{PortalRequest, PortalResponse};

// ───────────────────────────────────────────────────────────────
// ESP-IDF radio
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
    use std::time::Duration;

    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::http::Method as HttpMethod;
    use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};
    use esp_idf_svc::io::{Read, Write};
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi,
    };

    use super::*;
    use crate::provisioning::portal::Method;

    /// How long an HTTP handler waits for the connectivity task.
    const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
    const MAX_BODY: usize = 512;

    type Pending = (PortalRequest, SyncSender<PortalResponse>);

    pub struct WifiRadio {
        wifi: BlockingWifi<EspWifi<'static>>,
        server: Option<EspHttpServer<'static>>,
        requests_tx: Sender<Pending>,
        requests: Receiver<Pending>,
        reply: Option<SyncSender<PortalResponse>>,
    }

    impl WifiRadio {
        pub fn new(
            modem: Modem,
            sys_loop: EspSystemEventLoop,
            nvs: EspDefaultNvsPartition,
        ) -> Result<Self, LinkError> {
            let esp = EspWifi::new(modem, sys_loop.clone(), Some(nvs)).map_err(|e| {
                warn!("WiFi(espidf): driver init failed: {}", e);
                LinkError::AssociationFailed
            })?;
            let wifi = BlockingWifi::wrap(esp, sys_loop).map_err(|_| LinkError::AssociationFailed)?;
            let (requests_tx, requests) = mpsc::channel();
            Ok(Self {
                wifi,
                server: None,
                requests_tx,
                requests,
                reply: None,
            })
        }

        pub(super) fn platform_begin(&mut self, creds: &Credentials) -> Result<(), LinkError> {
            let auth_method = if creds.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration {
                    ssid: creds.ssid.as_str().try_into().map_err(|_| LinkError::InvalidSsid)?,
                    password: creds.password.as_str().try_into().map_err(|_| LinkError::InvalidPassword)?,
                    auth_method,
                    ..Default::default()
                }))
                .map_err(|_| LinkError::AssociationFailed)?;
            if !self.wifi.is_started().unwrap_or(false) {
                self.wifi.start().map_err(|_| LinkError::AssociationFailed)?;
            }
            // Non-blocking connect; the connectivity task polls `is_up`.
            self.wifi.wifi_mut().connect().map_err(|_| LinkError::AssociationFailed)
        }

        pub(super) fn platform_is_up(&self) -> bool {
            self.wifi.is_up().unwrap_or(false)
        }

        pub(super) fn platform_disconnect(&mut self) {
            if self.wifi.is_connected().unwrap_or(false) {
                let _ = self.wifi.wifi_mut().disconnect();
            }
        }

        pub(super) fn platform_scan(&mut self) -> Vec<String> {
            // With the portal up the radio is already in mixed mode and the
            // station half can scan without dropping the AP.
            if self.server.is_none() {
                if self
                    .wifi
                    .set_configuration(&Configuration::Client(ClientConfiguration::default()))
                    .is_err()
                {
                    return Vec::new();
                }
                if !self.wifi.is_started().unwrap_or(false) && self.wifi.start().is_err() {
                    return Vec::new();
                }
            }
            match self.wifi.scan() {
                Ok(mut aps) => {
                    aps.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));
                    let mut ssids: Vec<String> = Vec::new();
                    for ap in aps {
                        let ssid = ap.ssid.as_str();
                        if !ssid.is_empty() && !ssids.iter().any(|s| s == ssid) {
                            ssids.push(ssid.to_owned());
                        }
                    }
                    ssids
                }
                Err(e) => {
                    warn!("WiFi(espidf): scan failed: {}", e);
                    Vec::new()
                }
            }
        }

        pub(super) fn platform_start_ap(&mut self, ssid: &str, password: &str) -> Result<Ipv4Addr, LinkError> {
            let auth_method = if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let _ = self.wifi.stop();
            self.wifi
                .set_configuration(&Configuration::Mixed(
                    ClientConfiguration::default(),
                    AccessPointConfiguration {
                        ssid: ssid.try_into().map_err(|_| LinkError::InvalidSsid)?,
                        password: password.try_into().map_err(|_| LinkError::InvalidPassword)?,
                        auth_method,
                        channel: 1,
                        ..Default::default()
                    },
                ))
                .map_err(|_| LinkError::AccessPointFailed)?;
            self.wifi.start().map_err(|_| LinkError::AccessPointFailed)?;
            self.wifi.wait_netif_up().map_err(|_| LinkError::AccessPointFailed)?;

            let ip = self
                .wifi
                .wifi()
                .ap_netif()
                .get_ip_info()
                .map_err(|_| LinkError::AccessPointFailed)?
                .ip;
            self.server = Some(self.start_http()?);
            Ok(ip)
        }

        fn start_http(&self) -> Result<EspHttpServer<'static>, LinkError> {
            let conf = HttpConfiguration {
                uri_match_wildcard: true,
                ..Default::default()
            };
            let mut server = EspHttpServer::new(&conf).map_err(|_| LinkError::AccessPointFailed)?;

            for (http_method, method) in [(HttpMethod::Get, Method::Get), (HttpMethod::Post, Method::Post)] {
                let tx = self.requests_tx.clone();
                server
                    .fn_handler::<anyhow::Error, _>("/*", http_method, move |mut req| {
                        let path = req.uri().to_owned();
                        let mut body = Vec::new();
                        if method == Method::Post {
                            let mut buf = [0u8; 128];
                            while body.len() < MAX_BODY {
                                let n = req.read(&mut buf)?;
                                if n == 0 {
                                    break;
                                }
                                body.extend_from_slice(&buf[..n]);
                            }
                        }
                        let request = PortalRequest {
                            method,
                            path,
                            body: String::from_utf8_lossy(&body).into_owned(),
                        };

                        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
                        tx.send((request, reply_tx))?;
                        let response = reply_rx
                            .recv_timeout(REPLY_TIMEOUT)
                            .unwrap_or_else(|_| PortalResponse::page(503, "Busy", "Try again."));
                        req.into_response(response.status, None, &[("Content-Type", PortalResponse::CONTENT_TYPE)])?
                            .write_all(response.body.as_bytes())?;
                        Ok(())
                    })
                    .map_err(|_| LinkError::AccessPointFailed)?;
            }
            Ok(server)
        }

        pub(super) fn platform_stop_ap(&mut self) {
            self.server = None;
            self.reply = None;
            while self.requests.try_recv().is_ok() {}
            let _ = self.wifi.stop();
        }

        pub(super) fn platform_next_request(&mut self) -> Option<PortalRequest> {
            let (request, reply) = self.requests.try_recv().ok()?;
            self.reply = Some(reply);
            Some(request)
        }

        pub(super) fn platform_respond(&mut self, response: PortalResponse) {
            if let Some(reply) = self.reply.take() {
                let _ = reply.send(response);
            }
        }
    }
}

#[cfg(target_os = "espidf")]
pub use platform::WifiRadio;

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod platform {
    use std::collections::VecDeque;

    use super::*;

    /// Address the ESP-IDF soft-AP hands itself by default.
    const SIM_AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

    #[derive(Debug, Default)]
    pub struct WifiRadio {
        networks: Vec<(String, String)>,
        joined: Option<String>,
        ap_up: bool,
        requests: VecDeque<PortalRequest>,
        responses: Vec<PortalResponse>,
    }

    impl WifiRadio {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make a network reachable with the given password.
        pub fn sim_add_network(&mut self, ssid: &str, password: &str) {
            self.networks.push((ssid.to_owned(), password.to_owned()));
        }

        /// Take a network away; an associated station loses its link.
        pub fn sim_drop_network(&mut self, ssid: &str) {
            self.networks.retain(|(s, _)| s != ssid);
            if self.joined.as_deref() == Some(ssid) {
                self.joined = None;
            }
        }

        /// Queue an HTTP request as if a phone had sent it.
        pub fn sim_push_request(&mut self, request: PortalRequest) {
            self.requests.push_back(request);
        }

        pub fn sim_responses(&self) -> &[PortalResponse] {
            &self.responses
        }

        pub fn sim_ap_up(&self) -> bool {
            self.ap_up
        }

        pub(super) fn platform_begin(&mut self, creds: &Credentials) -> Result<(), LinkError> {
            self.joined = self
                .networks
                .iter()
                .find(|(s, p)| *s == creds.ssid && *p == creds.password)
                .map(|(s, _)| s.clone());
            info!("WiFi(sim): begin '{}' -> {}", creds.ssid, self.joined.is_some());
            Ok(())
        }

        pub(super) fn platform_is_up(&self) -> bool {
            self.joined.is_some()
        }

        pub(super) fn platform_disconnect(&mut self) {
            self.joined = None;
        }

        pub(super) fn platform_scan(&mut self) -> Vec<String> {
            self.networks.iter().map(|(s, _)| s.clone()).collect()
        }

        pub(super) fn platform_start_ap(&mut self, _ssid: &str, _password: &str) -> Result<Ipv4Addr, LinkError> {
            self.ap_up = true;
            Ok(SIM_AP_ADDRESS)
        }

        pub(super) fn platform_stop_ap(&mut self) {
            self.ap_up = false;
            self.requests.clear();
        }

        pub(super) fn platform_next_request(&mut self) -> Option<PortalRequest> {
            if !self.ap_up {
                return None;
            }
            self.requests.pop_front()
        }

        pub(super) fn platform_respond(&mut self, response: PortalResponse) {
            self.responses.push(response);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub use platform::WifiRadio;

// ───────────────────────────────────────────────────────────────
// Ports
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiRadio {
    fn begin(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        info!("WiFi: associating with '{}'", credentials.ssid);
        self.platform_begin(credentials)
    }

    fn is_up(&self) -> bool {
        self.platform_is_up()
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
    }
}

impl ProvisioningPort for WifiRadio {
    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<Ipv4Addr, LinkError> {
        self.platform_disconnect();
        self.platform_start_ap(ssid, password)
    }

    fn stop_access_point(&mut self) {
        info!("WiFi: access point down");
        self.platform_stop_ap();
    }

    fn scan_networks(&mut self) -> Vec<String> {
        self.platform_scan()
    }

    fn next_request(&mut self) -> Option<PortalRequest> {
        self.platform_next_request()
    }

    fn respond(&mut self, response: PortalResponse) {
        self.platform_respond(response);
    }
}
