use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::MessageRow;

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        content: row.get(4)?,
        replies_to: row.get(5)?,
        created_at: row.get(6)?,
        reply_count: None,
    })
}

fn message_with_replies_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let mut message = message_from_row(row)?;
    message.reply_count = Some(row.get(7)?);
    Ok(message)
}

/// Insert a message and return its id. Ids come from AUTOINCREMENT, so they
/// are never reused and increase with commit order.
pub fn insert_message(
    conn: &Connection,
    channel_id: i64,
    user_id: i64,
    content: &str,
    replies_to: Option<i64>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO messages (channel_id, user_id, content, replies_to) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![channel_id, user_id, content, replies_to],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Single message joined with its author's username.
pub fn message_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<MessageRow>> {
    conn.query_row(
        "SELECT m.id, m.channel_id, m.user_id, u.username, m.content, m.replies_to, m.created_at
         FROM messages m
         JOIN users u ON m.user_id = u.id
         WHERE m.id = ?1",
        [id],
        message_from_row,
    )
    .optional()
}

/// Root messages of a channel with their reply counts, newest first.
pub fn top_level_messages(conn: &Connection, channel_id: i64) -> rusqlite::Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.channel_id, m.user_id, u.username, m.content, m.replies_to, m.created_at,
                (SELECT COUNT(*) FROM messages r WHERE r.replies_to = m.id) AS reply_count
         FROM messages m
         JOIN users u ON m.user_id = u.id
         WHERE m.channel_id = ?1
           AND m.replies_to IS NULL
         ORDER BY m.created_at DESC, m.id DESC",
    )?;

    let rows = stmt
        .query_map([channel_id], message_with_replies_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Direct replies to `message_id`, oldest first.
pub fn replies_to_message(conn: &Connection, message_id: i64) -> rusqlite::Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.channel_id, m.user_id, u.username, m.content, m.replies_to, m.created_at
         FROM messages m
         JOIN users u ON m.user_id = u.id
         WHERE m.replies_to = ?1
         ORDER BY m.created_at ASC, m.id ASC",
    )?;

    let rows = stmt
        .query_map([message_id], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn message_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row("SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1)", [id], |row| {
        row.get(0)
    })
}

/// Highest message id in the channel, if it has any messages.
pub fn latest_message_id(conn: &Connection, channel_id: i64) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT MAX(id) FROM messages WHERE channel_id = ?1",
        [channel_id],
        |row| row.get(0),
    )
}
