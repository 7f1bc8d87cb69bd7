/// Schema for the local store. Timestamps are UTC milliseconds.
pub const SCHEMA: &str = r#"
-- Cached items
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY,
    datetime INTEGER NOT NULL,
    unread INTEGER NOT NULL DEFAULT 0,
    starred INTEGER NOT NULL DEFAULT 0,
    source INTEGER NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    html TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_entries_datetime ON entries(datetime);
CREATE INDEX IF NOT EXISTS idx_entries_unread ON entries(unread);
CREATE INDEX IF NOT EXISTS idx_entries_starred ON entries(starred);
CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(source);
CREATE INDEX IF NOT EXISTS idx_entries_tags ON entries(tags);
CREATE INDEX IF NOT EXISTS idx_entries_datetime_id ON entries(datetime, id);

-- Pending status mutations, drained in id order
CREATE TABLE IF NOT EXISTS status_queue (
    queue_id INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id INTEGER NOT NULL,
    name TEXT NOT NULL CHECK (name IN ('unread', 'starred')),
    value INTEGER NOT NULL,
    enqueued_at INTEGER NOT NULL
);

-- Named bookkeeping timestamps
CREATE TABLE IF NOT EXISTS stamps (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

-- Named counters mirrored from the server
CREATE TABLE IF NOT EXISTS stats (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

-- Tag metadata
CREATE TABLE IF NOT EXISTS tags (
    name TEXT PRIMARY KEY,
    unread INTEGER NOT NULL DEFAULT 0,
    foreground TEXT NOT NULL DEFAULT '',
    background TEXT NOT NULL DEFAULT ''
);

-- Durable preferences that outlive the cached data
CREATE TABLE IF NOT EXISTS preferences (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
