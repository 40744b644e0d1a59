use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
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

CREATE TABLE IF NOT EXISTS metadata_category (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    sortorder INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS metadata_field (
    id INTEGER PRIMARY KEY,
    categoryid INTEGER NOT NULL REFERENCES metadata_category (id),
    shortname TEXT NOT NULL,
    name TEXT NOT NULL,
    datatype TEXT NOT NULL,
    defaultdata TEXT NOT NULL DEFAULT '',
    required INTEGER NOT NULL DEFAULT 0,
    locked INTEGER NOT NULL DEFAULT 0,
    forceunique INTEGER NOT NULL DEFAULT 0,
    signup INTEGER NOT NULL DEFAULT 0,
    visible INTEGER NOT NULL DEFAULT 2,
    contextlevel INTEGER NOT NULL,
    sortorder INTEGER NOT NULL DEFAULT 0,
    UNIQUE (contextlevel, shortname)
);
CREATE INDEX IF NOT EXISTS idx_metadata_field_category ON metadata_field (categoryid, shortname);

CREATE TABLE IF NOT EXISTS metadata (
    id INTEGER PRIMARY KEY,
    instanceid INTEGER NOT NULL,
    fieldid INTEGER NOT NULL REFERENCES metadata_field (id),
    data TEXT NOT NULL,
    dataformat INTEGER NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_metadata_instance_field ON metadata (instanceid, fieldid);
CREATE INDEX IF NOT EXISTS idx_metadata_field_data ON metadata (fieldid, data);

CREATE TABLE IF NOT EXISTS course (
    id INTEGER PRIMARY KEY,
    fullname TEXT NOT NULL,
    shortname TEXT NOT NULL,
    lang TEXT NOT NULL DEFAULT '',
    summary TEXT NOT NULL DEFAULT '',
    format TEXT NOT NULL DEFAULT 'topics',
    timecreated INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user (
    id INTEGER PRIMARY KEY,
    firstname TEXT NOT NULL,
    lastname TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS role_assignment (
    role TEXT NOT NULL,
    userid INTEGER NOT NULL REFERENCES user (id),
    courseid INTEGER NOT NULL REFERENCES course (id),
    PRIMARY KEY (role, userid, courseid)
);

CREATE TABLE IF NOT EXISTS tag (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS tag_instance (
    id INTEGER PRIMARY KEY,
    tagid INTEGER NOT NULL REFERENCES tag (id),
    itemid INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tag_instance_item ON tag_instance (itemid);

CREATE TABLE IF NOT EXISTS config (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";
