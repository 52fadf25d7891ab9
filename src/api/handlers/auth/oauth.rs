//! Sign in with Google (OAuth 2.0 authorization code flow).
//!
//! The CSRF state rides in a short-lived cookie because visitors have no
//! server-side session before they authenticate. Accounts created here carry
//! the federated password sentinel and can never log in with a password.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
};
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::api::flash::FlashKind;
use crate::api::handlers::redirect_with_flash;
use crate::cli::globals::{GoogleConfig, ServerConfig};
use crate::APP_USER_AGENT;

use super::establish_session;
use super::storage::{insert_user, lookup_user_by_email, SignupOutcome};
use super::utils::{normalize_email, FEDERATED_PASSWORD_SENTINEL};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

const STATE_COOKIE_NAME: &str = "shelfmark_oauth_state";

fn oauth_client(google: &GoogleConfig) -> Result<BasicClient> {
    use secrecy::ExposeSecret;
    let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string()).context("invalid auth URL")?;
    let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).context("invalid token URL")?;
    let redirect_url =
        RedirectUrl::new(google.redirect_url.clone()).context("invalid redirect URL")?;
    Ok(BasicClient::new(
        ClientId::new(google.client_id.clone()),
        Some(ClientSecret::new(
            google.client_secret.expose_secret().to_string(),
        )),
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect_url))
}

fn state_cookie(state: &str) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{STATE_COOKIE_NAME}={state}; Path=/; HttpOnly; SameSite=Lax; Max-Age=600"
    ))
}

fn clear_state_cookie() -> HeaderValue {
    HeaderValue::from_static("shelfmark_oauth_state=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn read_state_cookie(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == STATE_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn not_configured() -> Response {
    redirect_with_flash(
        "/login",
        FlashKind::Error,
        "Google sign-in is not configured.",
    )
}

fn sign_in_failed() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_state_cookie());
    if let Ok(cookie) = crate::api::flash::set_cookie(
        FlashKind::Error,
        "Google sign-in failed. Please try again.",
    ) {
        headers.append(SET_COOKIE, cookie);
    }
    (headers, Redirect::to("/login")).into_response()
}

/// GET /auth/google — kick off the flow with profile + email scopes.
pub async fn google_start(Extension(config): Extension<Arc<ServerConfig>>) -> Response {
    let Some(google) = config.google.as_ref() else {
        return not_configured();
    };
    let client = match oauth_client(google) {
        Ok(client) => client,
        Err(err) => {
            error!("Failed to build OAuth client: {err:#}");
            return not_configured();
        }
    };

    let (authorize_url, csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("profile".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .url();

    let mut headers = HeaderMap::new();
    match state_cookie(csrf_state.secret()) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build state cookie: {err}");
            return not_configured();
        }
    }
    (headers, Redirect::to(authorize_url.as_str())).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Claims returned by the Google userinfo endpoint.
#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    email_verified: Option<bool>,
}

/// GET /auth/google/book-tracker — the callback.
///
/// Success ends on the shelf; any failure (denied consent, CSRF mismatch,
/// exchange error, unverified email) lands back on the login form.
pub async fn google_callback(
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<ServerConfig>>,
) -> Response {
    let Some(google) = config.google.as_ref() else {
        return not_configured();
    };

    if let Some(err) = query.error.as_deref() {
        warn!("Google sign-in denied: {err}");
        return sign_in_failed();
    }

    // The state echoed by Google must match the cookie we set at the start.
    let expected = read_state_cookie(&headers);
    match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(state)) if expected == state => {}
        _ => {
            warn!("OAuth state mismatch");
            return sign_in_failed();
        }
    }

    let Some(code) = query.code else {
        warn!("OAuth callback without code");
        return sign_in_failed();
    };

    let email = match fetch_verified_email(google, code).await {
        Ok(email) => email,
        Err(err) => {
            error!("Google sign-in failed: {err:#}");
            return sign_in_failed();
        }
    };

    let user_id = match resolve_user(&pool, &email).await {
        Ok(user_id) => user_id,
        Err(err) => {
            error!("Failed to resolve federated user: {err:#}");
            return sign_in_failed();
        }
    };

    // Session cookie plus state-cookie cleanup ride on the same redirect.
    let response = establish_session(&pool, &config, user_id, None).await;
    let (mut parts, body) = response.into_parts();
    parts.headers.append(SET_COOKIE, clear_state_cookie());
    Response::from_parts(parts, body)
}

/// Exchange the code and require a provider-verified email claim.
async fn fetch_verified_email(google: &GoogleConfig, code: String) -> Result<String> {
    let client = oauth_client(google)?;
    let token = client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(async_http_client)
        .await
        .context("failed to exchange authorization code")?;

    let http = reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(Duration::from_secs(5))
        .build()
        .context("failed to build userinfo client")?;

    let info: UserInfo = http
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(token.access_token().secret())
        .send()
        .await
        .context("userinfo request failed")?
        .error_for_status()
        .context("userinfo returned an error status")?
        .json()
        .await
        .context("failed to parse userinfo response")?;

    if info.email_verified != Some(true) {
        anyhow::bail!("Google account email is not verified");
    }
    info.email
        .map(|email| normalize_email(&email))
        .context("Google account has no email claim")
}

/// Find the user for a verified email, creating a federated-only account on
/// first login. A concurrent signup shows up as a conflict; look it up again.
async fn resolve_user(pool: &PgPool, email: &str) -> Result<uuid::Uuid> {
    if let Some(user) = lookup_user_by_email(pool, email).await? {
        return Ok(user.id);
    }
    match insert_user(pool, email, FEDERATED_PASSWORD_SENTINEL).await? {
        SignupOutcome::Created(user_id) => Ok(user_id),
        SignupOutcome::Conflict => lookup_user_by_email(pool, email)
            .await?
            .map(|user| user.id)
            .context("user vanished after conflict"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    #[test]
    fn state_cookie_round_trip() {
        let cookie = state_cookie("csrf-token").expect("cookie");
        let pair = cookie
            .to_str()
            .expect("str")
            .split(';')
            .next()
            .expect("pair")
            .to_string();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&pair).expect("header"));
        assert_eq!(read_state_cookie(&headers), Some("csrf-token".to_string()));
    }

    #[test]
    fn missing_state_cookie_is_none() {
        assert_eq!(read_state_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn clear_state_cookie_expires() {
        assert!(clear_state_cookie()
            .to_str()
            .expect("str")
            .contains("Max-Age=0"));
    }

    #[test]
    fn userinfo_requires_verified_email() {
        let verified: UserInfo =
            serde_json::from_str(r#"{"email":"a@example.com","email_verified":true}"#)
                .expect("parse");
        assert_eq!(verified.email_verified, Some(true));

        let unverified: UserInfo =
            serde_json::from_str(r#"{"email":"a@example.com","email_verified":false}"#)
                .expect("parse");
        assert_eq!(unverified.email_verified, Some(false));

        let missing: UserInfo = serde_json::from_str(r#"{}"#).expect("parse");
        assert_eq!(missing.email, None);
        assert_eq!(missing.email_verified, None);
    }
}
