//! Conversions from DB rows to API models.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;

use shelf_db::models::{BookRow, UserRow};
use shelf_types::models::{Book, Provenance, User};

use crate::error::{ApiError, ApiResult};

/// RFC 3339 with microseconds, so lexical order matches chronological order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str, what: &str) -> ApiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ApiError::Internal(format!("corrupt {what} '{raw}': {e}")))
}

fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    raw.parse()
        .map_err(|e| ApiError::Internal(format!("corrupt {what} '{raw}': {e}")))
}

pub(crate) fn user_from_row(row: &UserRow) -> ApiResult<User> {
    Ok(User {
        id: parse_id(&row.id, "user id")?,
        username: row.username.clone(),
        email: row.email.clone(),
        created_at: parse_timestamp(&row.created_at, "user created_at")?,
        updated_at: parse_timestamp(&row.updated_at, "user updated_at")?,
    })
}

/// `cover_present` is false when the row names a cover file that is gone.
pub(crate) fn book_from_row(row: BookRow, cover_present: bool) -> ApiResult<Book> {
    let source = row.source.parse().unwrap_or_else(|e| {
        warn!("Book {} has {}; treating as manual", row.id, e);
        Provenance::Manual
    });
    let year = row.year.and_then(|y| {
        i32::try_from(y)
            .inspect_err(|_| warn!("Book {} has out-of-range year {}", row.id, y))
            .ok()
    });

    Ok(Book {
        id: parse_id(&row.id, "book id")?,
        user: parse_id(&row.user_id, "book owner")?,
        created_at: parse_timestamp(&row.created_at, "book created_at")?,
        updated_at: parse_timestamp(&row.updated_at, "book updated_at")?,
        title: row.title,
        author: row.author,
        genre: row.genre,
        year,
        description: row.description,
        rating: row.rating,
        favorite: row.favorite,
        cover_image: row.cover_image.filter(|_| cover_present),
        source,
        google_id: row.google_id,
    })
}
