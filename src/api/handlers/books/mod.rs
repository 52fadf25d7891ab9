//! Handlers for the book pages. Every route here sits behind the session
//! guard, so `CurrentUser` is always present in the request extensions.

pub mod storage;
pub mod types;

use axum::{
    extract::{Extension, Path, Query},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::api::flash::{self, FlashKind};
use crate::api::handlers::auth::session::CurrentUser;
use crate::api::handlers::redirect_with_flash;
use crate::api::views;
use crate::covers::CoverClient;

use self::storage::{delete_book, get_book, insert_book, list_books, update_book};
use self::types::{BookForm, SortKey};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    sort: Option<String>,
}

/// GET /book-tracker
///
/// A failed query is logged and rendered as an empty shelf so the page
/// always comes up.
pub async fn list(
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
    Extension(user): Extension<CurrentUser>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let sort = SortKey::from_query(query.sort.as_deref());
    let books = match list_books(&pool, user.id, sort).await {
        Ok(books) => books,
        Err(err) => {
            error!("Failed to list books: {err:#}");
            Vec::new()
        }
    };
    let (pending, clear) = flash::take(&headers);
    (
        clear,
        Html(views::book_list(&books, sort, pending.as_ref(), &user.email)),
    )
        .into_response()
}

/// GET /add
pub async fn add_form(headers: HeaderMap) -> Response {
    let (pending, clear) = flash::take(&headers);
    (clear, Html(views::add_form(pending.as_ref()))).into_response()
}

/// POST /add
///
/// The cover is always resolved through the enrichment client; anything the
/// form submitted for it is discarded. Failures leave the shelf unchanged.
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(pool): Extension<PgPool>,
    Extension(covers): Extension<CoverClient>,
    Form(form): Form<BookForm>,
) -> Response {
    let input = match form.validate() {
        Ok(input) => input,
        Err(message) => return redirect_with_flash("/add", FlashKind::Error, message),
    };

    let cover_url = covers.lookup(&input.title, &input.author).await;

    match insert_book(&pool, user.id, &input, &cover_url).await {
        Ok(_) => redirect_with_flash("/book-tracker", FlashKind::Success, "Book added successfully!"),
        Err(err) => {
            error!("Failed to add book: {err:#}");
            redirect_with_flash(
                "/book-tracker",
                FlashKind::Error,
                "Could not add book. Please try again.",
            )
        }
    }
}

/// GET /book/:id
///
/// A missing, foreign, or malformed id all behave the same: back to the
/// list. Existence of other users' books is never revealed.
pub async fn show(
    Path(id): Path<String>,
    Extension(user): Extension<CurrentUser>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let Some(book_id) = parse_book_id(&id) else {
        return Redirect::to("/book-tracker").into_response();
    };
    match get_book(&pool, user.id, book_id).await {
        Ok(Some(book)) => Html(views::book_detail(&book)).into_response(),
        Ok(None) => Redirect::to("/book-tracker").into_response(),
        Err(err) => {
            error!("Failed to load book: {err:#}");
            Redirect::to("/book-tracker").into_response()
        }
    }
}

/// GET /edit/:id
pub async fn edit_form(
    Path(id): Path<String>,
    Extension(user): Extension<CurrentUser>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let Some(book_id) = parse_book_id(&id) else {
        return Redirect::to("/book-tracker").into_response();
    };
    match get_book(&pool, user.id, book_id).await {
        Ok(Some(book)) => Html(views::edit_form(&book)).into_response(),
        Ok(None) => Redirect::to("/book-tracker").into_response(),
        Err(err) => {
            error!("Failed to load book for edit: {err:#}");
            Redirect::to("/book-tracker").into_response()
        }
    }
}

/// POST /edit/:id
///
/// Zero rows affected means the book does not exist or belongs to someone
/// else; that is reported as not-found rather than claimed as success.
pub async fn update(
    Path(id): Path<String>,
    Extension(user): Extension<CurrentUser>,
    Extension(pool): Extension<PgPool>,
    Extension(covers): Extension<CoverClient>,
    Form(form): Form<BookForm>,
) -> Response {
    let Some(book_id) = parse_book_id(&id) else {
        return redirect_with_flash("/book-tracker", FlashKind::Error, "Book not found.");
    };
    let input = match form.validate() {
        Ok(input) => input,
        Err(message) => {
            // Back to the form being corrected so the flash lands over it.
            return redirect_with_flash(&format!("/edit/{book_id}"), FlashKind::Error, message);
        }
    };

    // The edit form carries the current cover; a cleared field re-runs the
    // enrichment lookup.
    let cover_url = match input.cover_url.clone() {
        Some(url) => url,
        None => covers.lookup(&input.title, &input.author).await,
    };

    match update_book(&pool, user.id, book_id, &input, &cover_url).await {
        Ok(true) => redirect_with_flash(
            "/book-tracker",
            FlashKind::Success,
            "Book updated successfully!",
        ),
        Ok(false) => redirect_with_flash("/book-tracker", FlashKind::Error, "Book not found."),
        Err(err) => {
            error!("Failed to update book: {err:#}");
            redirect_with_flash("/book-tracker", FlashKind::Error, "Could not update book.")
        }
    }
}

/// POST /delete/:id
pub async fn remove(
    Path(id): Path<String>,
    Extension(user): Extension<CurrentUser>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let Some(book_id) = parse_book_id(&id) else {
        return redirect_with_flash("/book-tracker", FlashKind::Error, "Book not found.");
    };
    match delete_book(&pool, user.id, book_id).await {
        Ok(true) => redirect_with_flash(
            "/book-tracker",
            FlashKind::Success,
            "Book deleted successfully!",
        ),
        Ok(false) => redirect_with_flash("/book-tracker", FlashKind::Error, "Book not found."),
        Err(err) => {
            error!("Failed to delete book: {err:#}");
            redirect_with_flash("/book-tracker", FlashKind::Error, "Could not delete book.")
        }
    }
}

fn parse_book_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}
