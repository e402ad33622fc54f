use rusqlite::Connection;

use dtm_core::DtmError;

pub fn init_db(conn: &Connection) -> Result<(), DtmError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS interactions (
            id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            participant TEXT NOT NULL,
            section TEXT NOT NULL,
            kind TEXT NOT NULL,
            details TEXT NOT NULL,
            correctness TEXT NOT NULL,
            question TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_interactions_section ON interactions(section, kind);
        CREATE INDEX IF NOT EXISTS idx_interactions_participant ON interactions(participant);

        -- Rows are never edited once appended
        CREATE TRIGGER IF NOT EXISTS interactions_no_update BEFORE UPDATE ON interactions BEGIN
            SELECT RAISE(ABORT, 'interaction log is append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS interactions_no_delete BEFORE DELETE ON interactions BEGIN
            SELECT RAISE(ABORT, 'interaction log is append-only');
        END;
        ",
    )
    .map_err(|e| DtmError::Database(e.to_string()))?;

    Ok(())
}
