//! WiFi provisioning: the stored credentials record and the access-point
//! portal that creates it.

pub mod credentials;
pub mod portal;
