use rusqlite::{Connection, OptionalExtension};

use crate::models::{ReadCursorRow, UnreadRow};

/// Point the (user, channel) cursor at `message_id`, creating it if needed.
/// Overwrites unconditionally; the cursor is not forced to move forward.
pub fn upsert_read_cursor(
    conn: &Connection,
    user_id: i64,
    channel_id: i64,
    message_id: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO message_reads (user_id, channel_id, last_read_message_id, last_read_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT (user_id, channel_id) DO UPDATE SET
             last_read_message_id = excluded.last_read_message_id,
             last_read_at = excluded.last_read_at",
        rusqlite::params![user_id, channel_id, message_id],
    )?;
    Ok(())
}

pub fn read_cursor(
    conn: &Connection,
    user_id: i64,
    channel_id: i64,
) -> rusqlite::Result<Option<ReadCursorRow>> {
    conn.query_row(
        "SELECT user_id, channel_id, last_read_message_id, last_read_at
         FROM message_reads
         WHERE user_id = ?1 AND channel_id = ?2",
        [user_id, channel_id],
        |row| {
            Ok(ReadCursorRow {
                user_id: row.get(0)?,
                channel_id: row.get(1)?,
                last_read_message_id: row.get(2)?,
                last_read_at: row.get(3)?,
            })
        },
    )
    .optional()
}

/// Unread message count for every channel; a missing cursor counts as 0 so
/// every message in that channel is unread. One statement, one snapshot.
pub fn unread_counts(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<UnreadRow>> {
    let mut stmt = conn.prepare(
        "SELECT c.id,
                c.name,
                COUNT(DISTINCT CASE
                    WHEN m.id > COALESCE(mr.last_read_message_id, 0) THEN m.id
                END) AS unread_count
         FROM channels c
         LEFT JOIN messages m ON c.id = m.channel_id
         LEFT JOIN message_reads mr ON c.id = mr.channel_id AND mr.user_id = ?1
         GROUP BY c.id
         ORDER BY c.id",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(UnreadRow {
                channel_id: row.get(0)?,
                channel_name: row.get(1)?,
                unread_count: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}
