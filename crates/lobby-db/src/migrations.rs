use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE conversations (
                id              TEXT PRIMARY KEY,
                type            TEXT NOT NULL CHECK (type IN ('dm', 'group')),
                subtype         TEXT NOT NULL,
                hotel_id        TEXT NOT NULL,
                name            TEXT,
                admin_id        TEXT,
                owner_id        TEXT,
                created_by      TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                last_message    TEXT
            );

            -- One DM per (hotel, admin, owner); concurrent creators converge
            -- on this index, not on an application lock.
            CREATE UNIQUE INDEX idx_conversations_dm
                ON conversations(hotel_id, admin_id, owner_id)
                WHERE type = 'dm';

            CREATE INDEX idx_conversations_hotel
                ON conversations(hotel_id, created_at);

            CREATE TABLE participants (
                conversation_id         TEXT NOT NULL REFERENCES conversations(id),
                user_id                 TEXT NOT NULL,
                role                    TEXT NOT NULL,
                joined_at               TEXT NOT NULL,
                last_read_message_id    INTEGER,
                PRIMARY KEY (conversation_id, user_id)
            );

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                sender_id       TEXT NOT NULL,
                kind            TEXT NOT NULL CHECK (kind IN ('text', 'file')),
                text            TEXT NOT NULL DEFAULT '',
                attachments     TEXT NOT NULL DEFAULT '[]',
                links           TEXT NOT NULL DEFAULT '[]',
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, id);

            CREATE TABLE blobs (
                id          TEXT PRIMARY KEY,
                file_name   TEXT NOT NULL,
                mime_type   TEXT NOT NULL,
                size        INTEGER NOT NULL DEFAULT 0,
                chunk_size  INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                sha256      TEXT NOT NULL DEFAULT '',
                source      TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE blob_chunks (
                blob_id     TEXT NOT NULL REFERENCES blobs(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                data        BLOB NOT NULL,
                PRIMARY KEY (blob_id, chunk_index)
            );

            CREATE TABLE attachments (
                id              TEXT PRIMARY KEY,
                blob_id         TEXT NOT NULL REFERENCES blobs(id),
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                message_id      INTEGER REFERENCES messages(id),
                file_name       TEXT NOT NULL,
                mime_type       TEXT NOT NULL,
                size            INTEGER NOT NULL,
                thumbnails      TEXT NOT NULL DEFAULT '[]',
                uploader_id     TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_attachments_conversation
                ON attachments(conversation_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
