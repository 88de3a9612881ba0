//! SQL schema, applied idempotently when the database is opened.
//!
//! `short_code` carries `COLLATE NOCASE` so the UNIQUE constraint is the
//! final authority on case-insensitive uniqueness; application-level
//! checks only exist to produce friendly form errors.

pub const CREATE_SHORT_LINKS: &str = "
CREATE TABLE IF NOT EXISTS short_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_url TEXT NOT NULL,
    short_code TEXT NOT NULL UNIQUE COLLATE NOCASE,
    click_count INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

pub const CREATE_PUSH_SUBSCRIPTIONS: &str = "
CREATE TABLE IF NOT EXISTS push_subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    endpoint TEXT NOT NULL UNIQUE,
    p256dh TEXT NOT NULL,
    auth TEXT NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";
