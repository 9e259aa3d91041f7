use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS leads (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    full_name TEXT NOT NULL,
    email TEXT,
    phone TEXT NOT NULL,
    city TEXT NOT NULL,
    property_type TEXT NOT NULL,
    bhk TEXT,
    purpose TEXT NOT NULL,
    budget_min INTEGER CHECK (budget_min IS NULL OR budget_min >= 0),
    budget_max INTEGER CHECK (budget_max IS NULL OR budget_max >= 0),
    timeline TEXT NOT NULL,
    source TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'New',
    notes TEXT,
    tags BLOB NOT NULL,
    owner_id BLOB NOT NULL CHECK (length(owner_id) = 16),
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12)
);
CREATE INDEX IF NOT EXISTS idx_leads_updated ON leads (updated_at, id);
CREATE INDEX IF NOT EXISTS idx_leads_owner ON leads (owner_id);
CREATE INDEX IF NOT EXISTS idx_leads_status ON leads (status);

CREATE TABLE IF NOT EXISTS lead_history (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    lead_id BLOB NOT NULL REFERENCES leads (id) ON DELETE CASCADE,
    changed_by BLOB NOT NULL CHECK (length(changed_by) = 16),
    changed_at BLOB NOT NULL CHECK (length(changed_at) = 12),
    kind TEXT NOT NULL,
    diff BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_history_lead ON lead_history (lead_id, changed_at);
";
