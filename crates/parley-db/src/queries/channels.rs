use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::ChannelRow;

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

pub fn insert_channel(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    conn.execute("INSERT INTO channels (name) VALUES (?1)", [name])?;
    Ok(conn.last_insert_rowid())
}

pub fn channel_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<ChannelRow>> {
    conn.query_row(
        "SELECT id, name, created_at FROM channels WHERE id = ?1",
        [id],
        channel_from_row,
    )
    .optional()
}

pub fn list_channels(conn: &Connection) -> rusqlite::Result<Vec<ChannelRow>> {
    let mut stmt = conn.prepare("SELECT id, name, created_at FROM channels ORDER BY id")?;
    let rows = stmt
        .query_map([], channel_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
