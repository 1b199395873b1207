use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::blog::domain::UserId;
use crate::blog::repository::timestamp;
use crate::db::is_unique_violation;
use crate::db::models::{Role, User};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

const USER_COLUMNS: &str = "id, username, email, role, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        role: role.parse().unwrap_or(Role::User),
        created_at: row.get(4)?,
    })
}

/// Insert an account. The very first account on an empty database is made admin.
pub fn insert_user(
    pool: &DbPool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<User> {
    let conn = pool.get()?;
    let id = UserId::generate();

    // Single statement, so the emptiness check and the insert cannot interleave
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, role, created_at)
         VALUES (?1, ?2, ?3, ?4,
                 CASE WHEN EXISTS (SELECT 1 FROM users) THEN 'user' ELSE 'admin' END,
                 ?5)",
        params![id.as_str(), username, email, password_hash, timestamp(Utc::now())],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::BadRequest("User already exists".into())
        } else {
            AppError::Database(e)
        }
    })?;

    let user = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.as_str()],
        user_from_row,
    )?;
    tracing::info!(user_id = %user.id, role = %user.role, "account registered");
    Ok(user)
}

/// Account plus stored hash, for credential checks.
pub fn find_credentials(pool: &DbPool, email: &str) -> AppResult<Option<(User, String)>> {
    let conn = pool.get()?;
    let found = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
            params![email],
            |row| Ok((user_from_row(row)?, row.get::<_, String>(5)?)),
        )
        .optional()?;
    Ok(found)
}

pub fn find_by_id(pool: &DbPool, id: &UserId) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.as_str()],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}
