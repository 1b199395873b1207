use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::blog::domain::UserId;
use crate::db::models::{Role, User};
use crate::error::AppResult;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: &UserId, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id.as_str(), token, format!("+{} hours", hours)],
    )?;

    // Opportunistic cleanup; sessions are otherwise only read by token
    let purged = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    if purged > 0 {
        tracing::debug!("Purged {} expired sessions", purged);
    }

    Ok(token)
}

/// Resolve a live session token to its user.
pub fn lookup(pool: &DbPool, token: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT u.id, u.username, u.email, u.role, u.created_at FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                let role: String = row.get(3)?;
                Ok(User {
                    id: UserId(row.get(0)?),
                    username: row.get(1)?,
                    email: row.get(2)?,
                    role: role.parse().unwrap_or(Role::User),
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    fn pool_with_user() -> (DbPool, TempDir) {
        let temp = TempDir::new().unwrap();
        let pool = db::create_pool(&temp.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO users (id, username, email, password_hash, role, created_at)
                 VALUES ('u1', 'ada', 'ada@example.com', 'x', 'admin', '2025-01-01T00:00:00.000000Z')",
                [],
            )
            .unwrap();
        (pool, temp)
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn session_round_trip() {
        let (pool, _temp) = pool_with_user();
        let token = create_session(&pool, &UserId::new("u1"), 1).unwrap();

        let user = lookup(&pool, &token).unwrap().unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(user.role, Role::Admin);

        delete_session(&pool, &token).unwrap();
        assert!(lookup(&pool, &token).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_rejected() {
        let (pool, _temp) = pool_with_user();
        let token = create_session(&pool, &UserId::new("u1"), 1).unwrap();
        pool.get()
            .unwrap()
            .execute(
                "UPDATE sessions SET expires_at = datetime('now', '-1 hours') WHERE token = ?1",
                params![token],
            )
            .unwrap();
        assert!(lookup(&pool, &token).unwrap().is_none());
    }

    #[test]
    fn unknown_token_is_none() {
        let (pool, _temp) = pool_with_user();
        assert!(lookup(&pool, "deadbeef").unwrap().is_none());
    }
}
