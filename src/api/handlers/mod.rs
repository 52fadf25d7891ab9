pub mod auth;
pub mod books;

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use sqlx::PgPool;
use tracing::error;

use crate::api::flash::{self, FlashKind};

/// Redirect carrying a one-shot flash for the next rendered page.
pub(crate) fn redirect_with_flash(to: &str, kind: FlashKind, message: &str) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = flash::set_cookie(kind, message) {
        headers.insert(SET_COOKIE, cookie);
    }
    (headers, Redirect::to(to)).into_response()
}

/// GET / — landing page; where it goes depends on whether you're logged in.
pub async fn root(headers: HeaderMap, Extension(pool): Extension<PgPool>) -> Redirect {
    match auth::session::authenticate_session(&headers, &pool).await {
        Ok(Some(_)) => Redirect::to("/book-tracker"),
        Ok(None) => Redirect::to("/login"),
        Err(err) => {
            error!("Failed to lookup session: {err:#}");
            Redirect::to("/login")
        }
    }
}
