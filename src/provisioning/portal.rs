//! Access-point HTTP surface.
//!
//! | Method | Path    | Result                                             |
//! |--------|---------|----------------------------------------------------|
//! | GET    | `/`     | form, scanned SSIDs offered as `<datalist>` options |
//! | POST   | `/save` | validate, persist, confirmation page               |
//! | *      | *       | 404                                                |
//!
//! The portal is pure request → response logic; the radio adapter moves the
//! bytes and the connectivity task decides what happens after a save.

use std::borrow::Cow;
use std::fmt::Write as _;

use log::{info, warn};

use crate::app::ports::StoragePort;
use crate::provisioning::credentials::{self, Credentials};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRequest {
    pub method: Method,
    /// Request target; any query string is ignored.
    pub path: String,
    /// `application/x-www-form-urlencoded` body for POSTs.
    pub body: String,
}

impl PortalRequest {
    pub fn get(path: &str) -> Self {
        Self {
            method: Method::Get,
            path: path.to_owned(),
            body: String::new(),
        }
    }

    pub fn post(path: &str, body: &str) -> Self {
        Self {
            method: Method::Post,
            path: path.to_owned(),
            body: body.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalResponse {
    pub status: u16,
    pub body: String,
}

impl PortalResponse {
    pub const CONTENT_TYPE: &'static str = "text/html; charset=utf-8";

    pub fn page(status: u16, title: &str, message: &str) -> Self {
        let mut body = String::with_capacity(256);
        let _ = write!(
            body,
            "<!DOCTYPE html><html><head><meta name=\"viewport\" content=\"width=device-width\">\
             <title>{title}</title></head><body><h2>{title}</h2><p>{}</p></body></html>",
            escape_html(message)
        );
        Self { status, body }
    }
}

/// `GET /`: the request that renders the network list.
pub fn is_form_request(request: &PortalRequest) -> bool {
    request.method == Method::Get && request.path.split('?').next() == Some("/")
}

/// Answer one request.  Returns the credentials when a valid `/save` was
/// persisted.
pub fn handle(
    request: &PortalRequest,
    networks: &[String],
    storage: &mut impl StoragePort,
) -> (PortalResponse, Option<Credentials>) {
    if is_form_request(request) {
        return (form_page(networks), None);
    }
    let path = request.path.split('?').next().unwrap_or_default();
    match (request.method, path) {
        (Method::Post, "/save") => save(&request.body, storage),
        _ => {
            info!("Portal: 404 {:?} {}", request.method, request.path);
            (PortalResponse::page(404, "Not Found", "Nothing here."), None)
        }
    }
}

fn save(body: &str, storage: &mut impl StoragePort) -> (PortalResponse, Option<Credentials>) {
    let mut ssid = None;
    let mut password = None;
    for (key, value) in parse_form(body) {
        match key.as_ref() {
            "ssid" => ssid = Some(value),
            "password" => password = Some(value),
            _ => {}
        }
    }

    let Some(ssid) = ssid else {
        return (PortalResponse::page(400, "Invalid", "SSID is required."), None);
    };
    let password = password.unwrap_or_default();

    let creds = match Credentials::new(&ssid, &password) {
        Ok(c) => c,
        Err(e) => {
            warn!("Portal: rejected form: {}", e);
            return (PortalResponse::page(400, "Invalid", &e.to_string()), None);
        }
    };

    match credentials::save(storage, &creds) {
        Ok(()) => {
            let msg = format!("Credentials saved. Connecting to {}...", creds.ssid);
            (PortalResponse::page(200, "Saved", &msg), Some(creds))
        }
        Err(e) => {
            warn!("Portal: persist failed: {}", e);
            (PortalResponse::page(500, "Error", "Could not store credentials."), None)
        }
    }
}

fn form_page(networks: &[String]) -> PortalResponse {
    let mut body = String::with_capacity(1024);
    body.push_str(
        "<!DOCTYPE html><html><head><meta name=\"viewport\" content=\"width=device-width\">\
         <title>WiFi Setup</title></head><body><h2>WiFi Setup</h2>\
         <form method=\"POST\" action=\"/save\">\
         <label>SSID <input name=\"ssid\" list=\"networks\" maxlength=\"32\" required></label><br>\
         <datalist id=\"networks\">",
    );
    for ssid in networks {
        let _ = write!(body, "<option value=\"{}\">", escape_html(ssid));
    }
    body.push_str(
        "</datalist>\
         <label>Password <input name=\"password\" type=\"password\" maxlength=\"64\"></label><br>\
         <input type=\"submit\" value=\"Save\"></form></body></html>",
    );
    PortalResponse { status: 200, body }
}

/// Split an urlencoded body into decoded `(key, value)` pairs.  Pairs that
/// fail to decode are skipped.
pub fn parse_form(body: &str) -> impl Iterator<Item = (Cow<'_, str>, String)> + '_ {
    body.split('&').filter(|p| !p.is_empty()).filter_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(k)?;
        let value = decode_component(v)?.into_owned();
        Some((key, value))
    })
}

fn decode_component(raw: &str) -> Option<Cow<'_, str>> {
    if raw.contains('+') {
        let spaced = raw.replace('+', " ");
        urlencoding::decode(&spaced).ok().map(|c| Cow::Owned(c.into_owned()))
    } else {
        urlencoding::decode(raw).ok()
    }
}

fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nvs::NvsAdapter;

    #[test]
    fn form_lists_scanned_networks_escaped() {
        let mut nvs = NvsAdapter::new().unwrap();
        let nets = vec!["home".to_string(), "<evil>".to_string()];
        let (resp, creds) = handle(&PortalRequest::get("/"), &nets, &mut nvs);
        assert_eq!(resp.status, 200);
        assert!(creds.is_none());
        assert!(resp.body.contains("<datalist id=\"networks\">"));
        assert!(resp.body.contains("<option value=\"home\">"));
        assert!(resp.body.contains("&lt;evil&gt;"));
        assert!(!resp.body.contains("<evil>"));
    }

    #[test]
    fn save_persists_and_returns_credentials() {
        let mut nvs = NvsAdapter::new().unwrap();
        let req = PortalRequest::post("/save", "ssid=home&password=secret");
        let (resp, creds) = handle(&req, &[], &mut nvs);
        assert_eq!(resp.status, 200);
        assert_eq!(creds, Some(Credentials::new("home", "secret").unwrap()));
        assert_eq!(
            credentials::load(&nvs).unwrap(),
            Some(Credentials::new("home", "secret").unwrap())
        );
    }

    #[test]
    fn utf8_ssid_is_saved_and_reloads() {
        let mut nvs = NvsAdapter::new().unwrap();
        let req = PortalRequest::post("/save", "ssid=Caf%C3%A9&password=secret");
        let (resp, creds) = handle(&req, &[], &mut nvs);
        assert_eq!(resp.status, 200);
        assert_eq!(creds.unwrap().ssid, "Café");
        assert_eq!(credentials::load(&nvs).unwrap().unwrap().ssid, "Café");
    }

    #[test]
    fn form_values_are_url_decoded() {
        let mut nvs = NvsAdapter::new().unwrap();
        let req = PortalRequest::post("/save", "ssid=My+Home%21&password=p%26ss%3Dword");
        let (_, creds) = handle(&req, &[], &mut nvs);
        let creds = creds.unwrap();
        assert_eq!(creds.ssid, "My Home!");
        assert_eq!(creds.password, "p&ss=word");
    }

    #[test]
    fn invalid_ssid_is_400_and_not_persisted() {
        let mut nvs = NvsAdapter::new().unwrap();
        let req = PortalRequest::post("/save", "ssid=&password=secret");
        let (resp, creds) = handle(&req, &[], &mut nvs);
        assert_eq!(resp.status, 400);
        assert!(creds.is_none());
        assert_eq!(credentials::load(&nvs).unwrap(), None);
    }

    #[test]
    fn missing_ssid_field_is_400() {
        let mut nvs = NvsAdapter::new().unwrap();
        let (resp, _) = handle(&PortalRequest::post("/save", "password=x"), &[], &mut nvs);
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn unknown_paths_and_methods_are_404() {
        let mut nvs = NvsAdapter::new().unwrap();
        for req in [
            PortalRequest::get("/favicon.ico"),
            PortalRequest::get("/save"),
            PortalRequest::post("/", "ssid=a"),
        ] {
            let (resp, creds) = handle(&req, &[], &mut nvs);
            assert_eq!(resp.status, 404, "{req:?}");
            assert!(creds.is_none());
        }
    }

    #[test]
    fn query_string_is_ignored_for_routing() {
        let mut nvs = NvsAdapter::new().unwrap();
        let (resp, _) = handle(&PortalRequest::get("/?refresh=1"), &[], &mut nvs);
        assert_eq!(resp.status, 200);
        assert!(is_form_request(&PortalRequest::get("/?refresh=1")));
        assert!(!is_form_request(&PortalRequest::get("/save")));
    }
}
