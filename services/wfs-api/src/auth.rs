//! HTTP Basic credential pass-through.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine};

use wfs_common::Credentials;

/// Realm announced in `WWW-Authenticate` challenges.
pub const REALM: &str = "farmOS WFS";

/// Extract Basic credentials from the `Authorization` header.
///
/// Anything other than a well-formed `Basic` value is treated as absent, so
/// the client gets a fresh challenge.
pub fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() {
        return None;
    }
    Some(Credentials::new(username, password))
}

/// Value of the `WWW-Authenticate` header sent with a 401.
pub fn challenge() -> String {
    format!("Basic realm=\"{}\"", REALM)
}
