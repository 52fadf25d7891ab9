//! Session cookie handling and the guard on book routes.

use axum::{
    extract::{Extension, Request},
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::flash::{self, FlashKind};
use crate::cli::globals::ServerConfig;

use super::storage::{lookup_session, SessionRecord};
use super::utils::hash_session_token;

const SESSION_COOKIE_NAME: &str = "shelfmark_session";

/// The logged-in user, resolved fresh from the store for each request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: uuid::Uuid,
    pub email: String,
}

impl From<SessionRecord> for CurrentUser {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.user_id,
            email: record.email,
        }
    }
}

/// Resolve the session cookie into a session record, if present.
///
/// Returns `Ok(None)` when the cookie is missing or does not match an
/// unexpired session.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    pool: &PgPool,
) -> anyhow::Result<Option<SessionRecord>> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_session_token(&token);
    lookup_session(pool, &token_hash).await
}

/// Route-layer guard for the book pages.
///
/// Unauthenticated requests never error: they pick up an error flash and a
/// redirect to the login view. Valid sessions attach [`CurrentUser`] to the
/// request extensions for the handlers downstream.
pub async fn require_session(
    Extension(pool): Extension<PgPool>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate_session(request.headers(), &pool).await {
        Ok(Some(record)) => {
            request.extensions_mut().insert(CurrentUser::from(record));
            next.run(request).await
        }
        Ok(None) => login_redirect(),
        Err(err) => {
            error!("Failed to lookup session: {err:#}");
            login_redirect()
        }
    }
}

fn login_redirect() -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = flash::set_cookie(FlashKind::Error, "Please log in to view that resource") {
        headers.insert(SET_COOKIE, cookie);
    }
    (headers, Redirect::to("/login")).into_response()
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(crate) fn session_cookie(
    config: &Arc<ServerConfig>,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds;
    // Only mark cookies secure when the site is served over HTTPS.
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(config: &Arc<ServerConfig>) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::globals::ServerConfig;

    fn config(secure: bool) -> Arc<ServerConfig> {
        Arc::new(ServerConfig::new(3600, secure))
    }

    #[test]
    fn session_cookie_sets_attributes() {
        let cookie = session_cookie(&config(false), "token").expect("cookie");
        let value = cookie.to_str().expect("str");
        assert!(value.starts_with("shelfmark_session=token;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=3600"));
        assert!(!value.contains("Secure"));
    }

    #[test]
    fn session_cookie_secure_flag() {
        let cookie = session_cookie(&config(true), "token").expect("cookie");
        assert!(cookie.to_str().expect("str").ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(&config(false)).expect("cookie");
        assert!(cookie.to_str().expect("str").contains("Max-Age=0"));
    }

    #[test]
    fn extracts_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; shelfmark_session=abc123; another=2"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn missing_cookie_yields_none() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("other=1"));
        assert_eq!(extract_session_token(&headers), None);
    }
}
