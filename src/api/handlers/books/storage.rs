//! SQL storage for the per-user book collection.
//!
//! Every read, update, and delete filters by both `id` and `user_id`; a user
//! can never reach another user's rows through this module.

use anyhow::{Context, Result};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{Book, BookInput, SortKey};

const SELECT_BOOKS: &str =
    "SELECT id, user_id, title, author, notes, rating, date_read, cover_url FROM books";

// The ORDER BY clause comes from the SortKey enum, never from the request.
fn list_query(sort: SortKey) -> String {
    format!("{SELECT_BOOKS} WHERE user_id = $1 ORDER BY {}", sort.order_by())
}

fn book_from_row(row: &PgRow) -> Book {
    Book {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        author: row.get("author"),
        notes: row.get("notes"),
        rating: row.get("rating"),
        date_read: row.get("date_read"),
        cover_url: row.get("cover_url"),
    }
}

/// All books for one user in the requested order.
pub(crate) async fn list_books(
    pool: &PgPool,
    user_id: Uuid,
    sort: SortKey,
) -> Result<Vec<Book>> {
    let query = list_query(sort);
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list books")?;

    Ok(rows.iter().map(book_from_row).collect())
}

/// A single book, only if it belongs to the given user.
pub(crate) async fn get_book(
    pool: &PgPool,
    user_id: Uuid,
    book_id: Uuid,
) -> Result<Option<Book>> {
    let query = format!("{SELECT_BOOKS} WHERE id = $1 AND user_id = $2");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(book_id)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to get book")?;

    Ok(row.as_ref().map(book_from_row))
}

/// Insert a new book owned by the given user. One statement, no partial rows.
pub(crate) async fn insert_book(
    pool: &PgPool,
    user_id: Uuid,
    input: &BookInput,
    cover_url: &str,
) -> Result<Uuid> {
    let query = r"
        INSERT INTO books (title, author, notes, rating, date_read, cover_url, user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&input.title)
        .bind(&input.author)
        .bind(input.notes.as_deref())
        .bind(input.rating)
        .bind(input.date_read)
        .bind(cover_url)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert book")?;

    Ok(row.get("id"))
}

/// Update a book in place; the user_id filter makes foreign ids a no-op.
/// Returns whether a row was actually updated so the handler can report
/// not-found instead of claiming success.
pub(crate) async fn update_book(
    pool: &PgPool,
    user_id: Uuid,
    book_id: Uuid,
    input: &BookInput,
    cover_url: &str,
) -> Result<bool> {
    let query = r"
        UPDATE books
        SET title = $1, author = $2, notes = $3, rating = $4, date_read = $5, cover_url = $6
        WHERE id = $7 AND user_id = $8
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(&input.title)
        .bind(&input.author)
        .bind(input.notes.as_deref())
        .bind(input.rating)
        .bind(input.date_read)
        .bind(cover_url)
        .bind(book_id)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update book")?;

    Ok(result.rows_affected() > 0)
}

/// Delete a book; foreign or missing ids affect zero rows and never raise.
pub(crate) async fn delete_book(pool: &PgPool, user_id: Uuid, book_id: Uuid) -> Result<bool> {
    let query = "DELETE FROM books WHERE id = $1 AND user_id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(book_id)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete book")?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::storage::{insert_user, SignupOutcome};
    use crate::api::schema;
    use anyhow::anyhow;
    use sqlx::postgres::PgPoolOptions;
    use time::macros::date;

    struct TestDb {
        pool: PgPool,
    }

    impl TestDb {
        async fn new() -> Result<Self> {
            let Ok(dsn) = std::env::var("SHELFMARK_TEST_DSN") else {
                eprintln!("Skipping database test: SHELFMARK_TEST_DSN is not set");
                return Err(anyhow!("no test database configured"));
            };
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&dsn)
                .await
                .context("failed to connect test pool")?;
            schema::init(&pool).await?;
            Ok(Self { pool })
        }
    }

    async fn create_user(pool: &PgPool) -> Result<Uuid> {
        let email = format!("{}@example.com", Uuid::new_v4());
        match insert_user(pool, &email, "$2b$10$test").await? {
            SignupOutcome::Created(id) => Ok(id),
            SignupOutcome::Conflict => Err(anyhow!("unexpected email conflict")),
        }
    }

    fn input(title: &str, author: &str, rating: f64, date_read: time::Date) -> BookInput {
        BookInput {
            title: title.to_string(),
            author: author.to_string(),
            notes: None,
            rating,
            date_read,
            cover_url: None,
        }
    }

    const COVER: &str = "/images/cover-fallback.jpg";

    #[test]
    fn list_query_embeds_sort_order() {
        for (sort, clause) in [
            (SortKey::Rating, "ORDER BY rating DESC"),
            (SortKey::Title, "ORDER BY title ASC"),
            (SortKey::DateRead, "ORDER BY date_read DESC"),
        ] {
            let query = list_query(sort);
            assert!(query.ends_with(clause));
            assert!(query.contains("WHERE user_id = $1"));
        }
    }

    #[tokio::test]
    async fn foreign_user_cannot_reach_books() {
        let Ok(db) = TestDb::new().await else {
            return;
        };
        let owner = create_user(&db.pool).await.expect("owner");
        let intruder = create_user(&db.pool).await.expect("intruder");
        let book_id = insert_book(
            &db.pool,
            owner,
            &input("Dune", "Frank Herbert", 5.0, date!(2024 - 01 - 06)),
            COVER,
        )
        .await
        .expect("insert");

        assert!(get_book(&db.pool, intruder, book_id)
            .await
            .expect("get")
            .is_none());

        let altered = input("Altered", "Nobody", 1.0, date!(2020 - 01 - 01));
        assert!(!update_book(&db.pool, intruder, book_id, &altered, COVER)
            .await
            .expect("update"));
        assert!(!delete_book(&db.pool, intruder, book_id)
            .await
            .expect("delete"));

        // The owner's row is untouched by any of the attempts above.
        let book = get_book(&db.pool, owner, book_id)
            .await
            .expect("get")
            .expect("book");
        assert_eq!(book.title, "Dune");
        assert_eq!(book.author, "Frank Herbert");
        assert!((book.rating - 5.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn book_lifecycle_round_trip() {
        let Ok(db) = TestDb::new().await else {
            return;
        };
        let user = create_user(&db.pool).await.expect("user");

        let book_id = insert_book(
            &db.pool,
            user,
            &input("Dune", "Frank Herbert", 4.0, date!(2024 - 01 - 06)),
            COVER,
        )
        .await
        .expect("insert");

        let books = list_books(&db.pool, user, SortKey::DateRead)
            .await
            .expect("list");
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].id, book_id);

        let mut revised = input("Dune Messiah", "Frank Herbert", 3.5, date!(2024 - 02 - 10));
        revised.notes = Some("Second read".to_string());
        assert!(update_book(&db.pool, user, book_id, &revised, COVER)
            .await
            .expect("update"));

        let book = get_book(&db.pool, user, book_id)
            .await
            .expect("get")
            .expect("book");
        assert_eq!(book.title, "Dune Messiah");
        assert_eq!(book.notes.as_deref(), Some("Second read"));
        assert_eq!(book.date_read, date!(2024 - 02 - 10));

        assert!(delete_book(&db.pool, user, book_id).await.expect("delete"));
        assert!(!delete_book(&db.pool, user, book_id).await.expect("delete"));
        assert!(!delete_book(&db.pool, user, Uuid::new_v4())
            .await
            .expect("delete"));
        assert!(list_books(&db.pool, user, SortKey::DateRead)
            .await
            .expect("list")
            .is_empty());
    }

    #[tokio::test]
    async fn list_orders_follow_sort_key() {
        let Ok(db) = TestDb::new().await else {
            return;
        };
        let user = create_user(&db.pool).await.expect("user");

        // Each sort key produces a different permutation of these three.
        for (title, rating, date_read) in [
            ("Middle", 3.0, date!(2024 - 02 - 01)),
            ("Apex", 5.0, date!(2024 - 01 - 01)),
            ("Zenith", 4.0, date!(2024 - 03 - 01)),
        ] {
            insert_book(&db.pool, user, &input(title, "Author", rating, date_read), COVER)
                .await
                .expect("insert");
        }

        let titles = |books: Vec<Book>| -> Vec<String> {
            books.into_iter().map(|book| book.title).collect()
        };

        let by_rating = list_books(&db.pool, user, SortKey::Rating).await.expect("list");
        assert_eq!(titles(by_rating), ["Apex", "Zenith", "Middle"]);

        let by_title = list_books(&db.pool, user, SortKey::Title).await.expect("list");
        assert_eq!(titles(by_title), ["Apex", "Middle", "Zenith"]);

        let by_date = list_books(&db.pool, user, SortKey::DateRead).await.expect("list");
        assert_eq!(titles(by_date), ["Zenith", "Middle", "Apex"]);
    }
}
