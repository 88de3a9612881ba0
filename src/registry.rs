//! The code registry: every query against `short_links` lives here.
//!
//! Uniqueness checks are check-then-insert; the `COLLATE NOCASE UNIQUE`
//! constraint on `short_code` is the final authority when two submissions
//! race, and a constraint failure at insert surfaces as the same
//! "already taken" form error.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::debug;

use crate::errors::AppError;
use crate::models::ShortLink;
use crate::utils::{generate_code, slugify};

pub const CODE_LENGTH: usize = 6;
pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_CODE_LENGTH: usize = 20;
pub const MIN_ALIAS_LENGTH: usize = 3;

const ALIAS_TAKEN: &str = "This alias is already taken. Please try another one.";

/// Draw random codes until one is free. The code space (62^6) dwarfs any
/// realistic table size, so the loop terminates almost immediately.
pub fn generate_unique_code(conn: &Connection, length: usize) -> Result<String, AppError> {
    loop {
        let candidate = generate_code(length);
        if !code_exists(conn, &candidate, None)? {
            return Ok(candidate);
        }
        debug!("generated code {} collided, retrying", candidate);
    }
}

fn code_exists(conn: &Connection, code: &str, exclude_id: Option<i64>) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM short_links
            WHERE short_code = ?1 COLLATE NOCASE AND (?2 IS NULL OR id != ?2)
        )",
        params![code, exclude_id],
        |row| row.get(0),
    )
}

/// Normalize a user-supplied alias and check it against existing codes.
///
/// A blank alias means "no alias requested" and yields `Ok(None)`.
/// `exclude_id` lets an edit keep the record's own current alias.
/// `field` names the offending form input in validation errors.
pub fn normalize_and_validate_alias(
    conn: &Connection,
    raw: &str,
    exclude_id: Option<i64>,
    field: &'static str,
) -> Result<Option<String>, AppError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let normalized = slugify(raw);
    if normalized.len() < MIN_ALIAS_LENGTH {
        return Err(AppError::validation(
            field,
            format!(
                "Alias must be at least {} characters after normalization.",
                MIN_ALIAS_LENGTH
            ),
        ));
    }
    if normalized.len() > MAX_CODE_LENGTH {
        return Err(AppError::validation(
            field,
            format!("Alias must be at most {} characters.", MAX_CODE_LENGTH),
        ));
    }
    if code_exists(conn, &normalized, exclude_id)? {
        return Err(AppError::validation(field, ALIAS_TAKEN));
    }

    Ok(Some(normalized))
}

/// Validate and trim a destination URL. Only http/https destinations are
/// accepted; anything else would turn the redirect into an open relay for
/// `javascript:` and friends.
pub fn validate_url(raw: &str, field: &'static str) -> Result<String, AppError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(AppError::validation(field, "URL cannot be empty."));
    }
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(AppError::validation(
            field,
            format!("URL must be at most {} characters.", MAX_URL_LENGTH),
        ));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|_| AppError::validation(field, "Enter a valid URL."))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        _ => Err(AppError::validation(
            field,
            "Only http:// and https:// URLs are allowed.",
        )),
    }
}

/// Create a new short link. A valid custom alias is used verbatim
/// (post-normalization); otherwise a fresh 6-character code is generated.
pub fn create_link(
    conn: &Connection,
    original_url: &str,
    custom_alias: &str,
) -> Result<ShortLink, AppError> {
    let original_url = validate_url(original_url, "original_url")?;
    let alias = normalize_and_validate_alias(conn, custom_alias, None, "custom_alias")?;

    let short_code = match alias {
        Some(alias) => alias,
        None => generate_unique_code(conn, CODE_LENGTH)?,
    };

    let inserted = conn.execute(
        "INSERT INTO short_links (original_url, short_code) VALUES (?1, ?2)",
        params![original_url, short_code],
    );
    if let Err(err) = inserted {
        // Lost the check-then-insert race: the constraint is authoritative.
        if is_unique_violation(&err) {
            return Err(AppError::validation("custom_alias", ALIAS_TAKEN));
        }
        return Err(err.into());
    }

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)?.ok_or(AppError::NotFound)
}

/// Rename an existing link's alias. The alias is required here, and the
/// record may keep its own current alias unchanged.
pub fn update_alias(
    conn: &Connection,
    link_id: i64,
    new_alias: &str,
) -> Result<ShortLink, AppError> {
    let link = find_by_id(conn, link_id)?.ok_or(AppError::NotFound)?;

    let alias = normalize_and_validate_alias(conn, new_alias, Some(link.id), "new_alias")?
        .ok_or_else(|| AppError::validation("new_alias", "Alias cannot be empty."))?;

    let updated = conn.execute(
        "UPDATE short_links
         SET short_code = ?1, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?2",
        params![alias, link.id],
    );
    if let Err(err) = updated {
        if is_unique_violation(&err) {
            return Err(AppError::validation("new_alias", ALIAS_TAKEN));
        }
        return Err(err.into());
    }

    find_by_id(conn, link.id)?.ok_or(AppError::NotFound)
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<ShortLink>, AppError> {
    let query = format!(
        "SELECT {} FROM short_links WHERE id = ?1",
        ShortLink::COLUMNS
    );
    let link = conn
        .query_row(&query, params![id], ShortLink::from_row)
        .optional()?;
    Ok(link)
}

pub fn find_by_code(conn: &Connection, code: &str) -> Result<Option<ShortLink>, AppError> {
    let query = format!(
        "SELECT {} FROM short_links WHERE short_code = ?1 COLLATE NOCASE",
        ShortLink::COLUMNS
    );
    let link = conn
        .query_row(&query, params![code], ShortLink::from_row)
        .optional()?;
    Ok(link)
}

/// Look up a code and count the click, returning the destination URL.
///
/// The increment is a single update expression evaluated inside the
/// datastore, so concurrent hits never lose a count.
pub fn resolve_and_count(conn: &Connection, code: &str) -> Result<String, AppError> {
    let link = find_by_code(conn, code)?.ok_or(AppError::NotFound)?;

    conn.execute(
        "UPDATE short_links SET click_count = click_count + 1 WHERE id = ?1",
        params![link.id],
    )?;

    Ok(link.original_url)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}
