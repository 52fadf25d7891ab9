//! Registration, local login, and logout.

pub mod oauth;
pub mod session;
pub(crate) mod storage;
pub(crate) mod utils;

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::flash::{self, FlashKind};
use crate::api::handlers::redirect_with_flash;
use crate::api::views;
use crate::cli::globals::ServerConfig;

use self::session::{clear_session_cookie, extract_session_token, session_cookie};
use self::storage::{delete_session, insert_session, insert_user, lookup_user_by_email, SignupOutcome};
use self::utils::{hash_password, hash_session_token, normalize_email, valid_email, verify_password};

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// GET /login
pub async fn login_page(headers: HeaderMap) -> Response {
    let (pending, clear) = flash::take(&headers);
    (clear, Html(views::login_page(pending.as_ref()))).into_response()
}

/// GET /register
pub async fn register_page(headers: HeaderMap) -> Response {
    let (pending, clear) = flash::take(&headers);
    (clear, Html(views::register_page(pending.as_ref()))).into_response()
}

/// POST /login
///
/// Missing users and bad passwords get distinct flash messages, but both
/// land back on the login form. Verification is bcrypt's constant-time
/// check; federated-only accounts always fail it.
pub async fn login(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<ServerConfig>>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let email = normalize_email(&form.email);

    let user = match lookup_user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!("Login attempt for unknown email");
            return redirect_with_flash("/login", FlashKind::Error, "User not found.");
        }
        Err(err) => {
            error!("Failed to lookup user: {err:#}");
            return redirect_with_flash(
                "/login",
                FlashKind::Error,
                "Something went wrong. Please try again.",
            );
        }
    };

    if !verify_password(&form.password, &user.password) {
        return redirect_with_flash("/login", FlashKind::Error, "Incorrect password.");
    }

    establish_session(&pool, &config, user.id, None).await
}

/// POST /register
///
/// A duplicate email never creates a second row; the unique constraint
/// reports it as a conflict and the visitor is pointed at the login form.
pub async fn register(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<ServerConfig>>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let email = normalize_email(&form.email);
    if !valid_email(&email) {
        return redirect_with_flash("/register", FlashKind::Error, "Enter a valid email address.");
    }
    if form.password.is_empty() {
        return redirect_with_flash("/register", FlashKind::Error, "Password is required.");
    }

    let password_hash = match hash_password(&form.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err:#}");
            return redirect_with_flash(
                "/register",
                FlashKind::Error,
                "Something went wrong during registration.",
            );
        }
    };

    match insert_user(&pool, &email, &password_hash).await {
        Ok(SignupOutcome::Created(user_id)) => {
            establish_session(
                &pool,
                &config,
                user_id,
                Some("You are now registered and logged in"),
            )
            .await
        }
        Ok(SignupOutcome::Conflict) => redirect_with_flash(
            "/register",
            FlashKind::Error,
            "Email already registered. Please log in.",
        ),
        Err(err) => {
            error!("Failed to register user: {err:#}");
            redirect_with_flash(
                "/register",
                FlashKind::Error,
                "Something went wrong during registration.",
            )
        }
    }
}

/// GET /logout — idempotent; always clears the cookie and heads home.
pub async fn logout(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<ServerConfig>>,
) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(&token);
        if let Err(err) = delete_session(&pool, &token_hash).await {
            error!("Failed to delete session: {err:#}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(&config) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (response_headers, Redirect::to("/")).into_response()
}

/// Create a session for the user and send them to the shelf, optionally
/// with a success flash riding along.
pub(crate) async fn establish_session(
    pool: &PgPool,
    config: &Arc<ServerConfig>,
    user_id: uuid::Uuid,
    success_message: Option<&str>,
) -> Response {
    let token = match insert_session(pool, user_id, config.session_ttl_seconds).await {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session: {err:#}");
            return redirect_with_flash(
                "/login",
                FlashKind::Error,
                "Something went wrong. Please log in.",
            );
        }
    };

    let mut headers = HeaderMap::new();
    match session_cookie(config, &token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return redirect_with_flash(
                "/login",
                FlashKind::Error,
                "Something went wrong. Please log in.",
            );
        }
    }
    if let Some(message) = success_message {
        if let Ok(cookie) = flash::set_cookie(FlashKind::Success, message) {
            headers.append(SET_COOKIE, cookie);
        }
    }
    (headers, Redirect::to("/book-tracker")).into_response()
}
