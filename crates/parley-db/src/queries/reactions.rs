use rusqlite::Connection;

use crate::models::ReactionCountRow;

/// Insert one (user, message, emoji) row. A repeat surfaces as a UNIQUE
/// violation; a missing message as a FOREIGN KEY violation.
pub fn insert_reaction(
    conn: &Connection,
    user_id: i64,
    message_id: i64,
    emoji: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO reactions (user_id, message_id, emoji) VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, message_id, emoji],
    )?;
    Ok(())
}

/// Returns the number of rows deleted (0 or 1).
pub fn delete_reaction(
    conn: &Connection,
    user_id: i64,
    message_id: i64,
    emoji: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM reactions WHERE user_id = ?1 AND message_id = ?2 AND emoji = ?3",
        rusqlite::params![user_id, message_id, emoji],
    )
}

/// Emoji -> count for one message, grouped over the current rows.
pub fn reaction_counts(
    conn: &Connection,
    message_id: i64,
) -> rusqlite::Result<Vec<ReactionCountRow>> {
    reaction_counts_for_messages(conn, &[message_id])
}

/// Batch-fetch reaction counts for a set of message ids.
pub fn reaction_counts_for_messages(
    conn: &Connection,
    message_ids: &[i64],
) -> rusqlite::Result<Vec<ReactionCountRow>> {
    if message_ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT message_id, emoji, COUNT(*) FROM reactions
         WHERE message_id IN ({})
         GROUP BY message_id, emoji
         ORDER BY message_id, emoji",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(message_ids), |row| {
            Ok(ReactionCountRow {
                message_id: row.get(0)?,
                emoji: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}
