use chrono::NaiveDateTime;
use rusqlite::Row;

/// A stored mapping from short code to destination URL.
#[derive(Debug, Clone)]
pub struct ShortLink {
    pub id: i64,
    pub original_url: String,
    pub short_code: String,
    pub click_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ShortLink {
    pub const COLUMNS: &'static str =
        "id, original_url, short_code, click_count, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ShortLink {
            id: row.get(0)?,
            original_url: row.get(1)?,
            short_code: row.get(2)?,
            click_count: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

/// A registered web-push endpoint. Pruned when delivery to it fails.
#[derive(Debug, Clone)]
pub struct PushSubscription {
    pub id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: NaiveDateTime,
}

impl PushSubscription {
    pub const COLUMNS: &'static str = "id, endpoint, p256dh, auth, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PushSubscription {
            id: row.get(0)?,
            endpoint: row.get(1)?,
            p256dh: row.get(2)?,
            auth: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}
