//! SQL schema for the consign SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS consignments (
    consignment_id TEXT PRIMARY KEY,
    carrier        TEXT NOT NULL,   -- 'tpc' | 'franch'
    tracking_no    TEXT NOT NULL,   -- normalised, upper-case
    booking_date   TEXT,            -- ISO 8601 date
    consignee      TEXT,
    pincode        TEXT,
    destination    TEXT,
    weight         TEXT,
    pieces         TEXT,
    last_status    TEXT,
    is_delivered   INTEGER NOT NULL DEFAULT 0,
    last_checked   TEXT,            -- ISO 8601 UTC
    created_at     TEXT NOT NULL,
    UNIQUE (carrier, tracking_no)
);

-- History is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS tracking_history (
    entry_id       TEXT PRIMARY KEY,
    consignment_id TEXT NOT NULL REFERENCES consignments(consignment_id),
    delivery_date  TEXT NOT NULL,
    destination    TEXT NOT NULL,
    delivery_area  TEXT NOT NULL,
    status         TEXT NOT NULL,
    drs_no         TEXT NOT NULL,
    stamp          TEXT NOT NULL,
    scraped_at     TEXT NOT NULL,
    UNIQUE (consignment_id, delivery_date, destination, delivery_area,
            status, drs_no, stamp)
);

CREATE INDEX IF NOT EXISTS consignments_pending_idx
    ON consignments(carrier, is_delivered);
CREATE INDEX IF NOT EXISTS history_consignment_idx
    ON tracking_history(consignment_id);

PRAGMA user_version = 1;
";
