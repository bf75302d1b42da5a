//! Fuzz target: provisioning portal `/save`
//!
//! Posts arbitrary bodies to the portal against an in-memory store and
//! asserts that only a 200 response persists credentials.
//!
//! cargo fuzz run fuzz_portal_form

#![no_main]

use attendo::adapters::nvs::NvsAdapter;
use attendo::provisioning::credentials;
use attendo::provisioning::portal::{self, PortalRequest};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(mut storage) = NvsAdapter::new() else {
        return;
    };
    let (response, saved) = portal::handle(&PortalRequest::post("/save", body), &[], &mut storage);
    assert_eq!(response.status == 200, saved.is_some());
    assert_eq!(credentials::load(&storage).ok().flatten(), saved);
});
