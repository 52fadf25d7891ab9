//! One-shot flash messages carried in a short-lived cookie.
//!
//! A cookie rather than a session column so that flashes also work for
//! visitors without a session (failed logins, duplicate registrations).

use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};

const FLASH_COOKIE_NAME: &str = "shelfmark_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

/// Build the cookie carrying a flash for the next rendered view.
/// The payload is base64 encoded so messages survive cookie value rules.
pub fn set_cookie(kind: FlashKind, message: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let payload = Base64UrlUnpadded::encode_string(
        format!("{}:{}", kind.as_str(), message).as_bytes(),
    );
    HeaderValue::from_str(&format!(
        "{FLASH_COOKIE_NAME}={payload}; Path=/; HttpOnly; SameSite=Lax; Max-Age=300"
    ))
}

/// Cookie that clears the flash once it has been rendered.
pub fn clear_cookie() -> HeaderValue {
    HeaderValue::from_static("shelfmark_flash=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Read the pending flash from the request, if any.
#[must_use]
pub fn read(headers: &HeaderMap) -> Option<Flash> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == FLASH_COOKIE_NAME {
            return decode(val);
        }
    }
    None
}

/// Take the pending flash and emit the header that clears it.
/// Rendered pages call this so a flash is only ever shown once.
#[must_use]
pub fn take(headers: &HeaderMap) -> (Option<Flash>, HeaderMap) {
    let flash = read(headers);
    let mut response_headers = HeaderMap::new();
    if flash.is_some() {
        response_headers.insert(SET_COOKIE, clear_cookie());
    }
    (flash, response_headers)
}

fn decode(value: &str) -> Option<Flash> {
    let bytes = Base64UrlUnpadded::decode_vec(value).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (kind, message) = decoded.split_once(':')?;
    Some(Flash {
        kind: FlashKind::parse(kind)?,
        message: message.to_string(),
    })
}
