//! Database helpers for users and sessions.

use anyhow::{anyhow, Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::{generate_session_token, hash_session_token, is_unique_violation};

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(crate) enum SignupOutcome {
    Created(Uuid),
    Conflict,
}

/// Stored credentials for local login.
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) password: String,
}

/// Minimal data resolved from a valid session cookie.
/// Only the user id is persisted with the session; the email is joined
/// fresh on every request so stale session data cannot diverge.
#[derive(Debug, Clone)]
pub(crate) struct SessionRecord {
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
}

/// Look up stored credentials by normalized email.
pub(crate) async fn lookup_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = "SELECT id, password FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user")?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        password: row.get("password"),
    }))
}

/// Insert a new user; duplicate emails surface as `Conflict`, not an error.
pub(crate) async fn insert_user(
    pool: &PgPool,
    email: &str,
    password: &str,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users (email, password)
        VALUES ($1, $2)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(password)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Create a session row and return the raw token for the cookie.
/// Only the token hash is stored.
pub(crate) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO user_sessions (user_id, session_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

/// Resolve a session token hash into the owning user, honoring expiry.
pub(crate) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    let query = r"
        SELECT users.id, users.email
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.session_hash = $1
          AND user_sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("id"),
        email: row.get("email"),
    }))
}

/// Logout is idempotent; it's fine if no rows are deleted.
pub(crate) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{SessionRecord, SignupOutcome, UserRecord};
    use uuid::Uuid;

    #[test]
    fn signup_outcome_debug_names() {
        let id = Uuid::nil();
        assert_eq!(
            format!("{:?}", SignupOutcome::Created(id)),
            format!("Created({id:?})")
        );
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn user_record_holds_values() {
        let record = UserRecord {
            id: Uuid::nil(),
            password: "$2b$10$hash".to_string(),
        };
        assert_eq!(record.id, Uuid::nil());
        assert_eq!(record.password, "$2b$10$hash");
    }

    #[test]
    fn session_record_holds_values() {
        let record = SessionRecord {
            user_id: Uuid::nil(),
            email: "reader@example.com".to_string(),
        };
        assert_eq!(record.user_id, Uuid::nil());
        assert_eq!(record.email, "reader@example.com");
    }
}
