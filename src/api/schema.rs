//! Idempotent schema setup run at startup.

use anyhow::{Context, Result};
use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    r"CREATE TABLE IF NOT EXISTS books (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        author TEXT NOT NULL,
        notes TEXT,
        rating DOUBLE PRECISION NOT NULL,
        date_read DATE NOT NULL,
        cover_url TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    r"CREATE INDEX IF NOT EXISTS books_user_id_idx ON books (user_id)",
    r"CREATE TABLE IF NOT EXISTS user_sessions (
        session_hash BYTEA PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        expires_at TIMESTAMPTZ NOT NULL
    )",
];

/// Create the tables if they don't exist.
pub(crate) async fn init(pool: &PgPool) -> Result<()> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to run schema statement: {statement}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::STATEMENTS;

    #[test]
    fn statements_are_idempotent() {
        for statement in STATEMENTS {
            assert!(statement.contains("IF NOT EXISTS"));
        }
    }

    #[test]
    fn books_reference_their_owner() {
        let books = STATEMENTS
            .iter()
            .find(|s| s.contains("CREATE TABLE IF NOT EXISTS books"))
            .expect("books table");
        assert!(books.contains("REFERENCES users (id)"));
    }
}
