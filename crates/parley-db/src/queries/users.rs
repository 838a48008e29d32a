use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::UserRow;

const USER_COLUMNS: &str = "id, username, password_hash, session_token, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        session_token: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Insert a user and return its id. A taken username surfaces as a UNIQUE
/// violation.
pub fn insert_user(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    session_token: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (username, password_hash, session_token) VALUES (?1, ?2, ?3)",
        (username, password_hash, session_token),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn user_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        [username],
        user_from_row,
    )
    .optional()
}

pub fn user_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id],
        user_from_row,
    )
    .optional()
}

/// Exact-match lookup of the user holding `token`.
pub fn user_id_by_session_token(conn: &Connection, token: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM users WHERE session_token = ?1",
        [token],
        |row| row.get(0),
    )
    .optional()
}

/// Replace (or clear, with `None`) the user's session token. Returns the
/// number of rows touched.
pub fn set_session_token(
    conn: &Connection,
    id: i64,
    token: Option<&str>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE users SET session_token = ?1 WHERE id = ?2",
        rusqlite::params![token, id],
    )
}

pub fn rename_user(conn: &Connection, id: i64, username: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE users SET username = ?1 WHERE id = ?2",
        rusqlite::params![username, id],
    )
}
