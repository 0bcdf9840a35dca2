/// Schema for all local tables.
pub const SCHEMA: &str = r#"
-- Cached call results and seeded resources (value stored as JSON)
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    component TEXT NOT NULL,
    value BLOB NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    fingerprint TEXT
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_component
    ON cache_entries(component);

-- Deferred operations, replayed in id order
CREATE TABLE IF NOT EXISTS sync_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    kind TEXT NOT NULL,
    payload BLOB NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_queue_site ON sync_queue(site, id);

-- Persisted settings, site scoped ones keyed as "{site}-{name}"
CREATE TABLE IF NOT EXISTS settings (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    value TEXT NOT NULL
);
"#;
