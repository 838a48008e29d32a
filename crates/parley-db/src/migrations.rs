use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                session_token   TEXT UNIQUE,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE channels (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id  INTEGER NOT NULL REFERENCES channels(id),
                user_id     INTEGER NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                replies_to  INTEGER REFERENCES messages(id),
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_messages_channel ON messages(channel_id, created_at);
            CREATE INDEX idx_messages_replies_to ON messages(replies_to);

            CREATE TABLE reactions (
                user_id     INTEGER NOT NULL REFERENCES users(id),
                message_id  INTEGER NOT NULL REFERENCES messages(id),
                emoji       TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(user_id, message_id, emoji)
            );

            CREATE INDEX idx_reactions_message ON reactions(message_id);

            CREATE TABLE message_reads (
                user_id                 INTEGER NOT NULL REFERENCES users(id),
                channel_id              INTEGER NOT NULL REFERENCES channels(id),
                last_read_message_id    INTEGER NOT NULL REFERENCES messages(id),
                last_read_at            TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, channel_id)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
