//! Book form input: multipart parsing and explicit field coercion.
//!
//! Every field arrives as text. Absent fields stay `None` so an update can
//! tell "not sent" from "sent empty"; the coercion helpers give every
//! possible input a defined outcome.

use axum::extract::Multipart;
use tracing::debug;

use shelf_assets::{AssetStore, PendingAsset};
use shelf_db::models::BookRow;
use shelf_types::models::Provenance;

use crate::error::{ApiError, ApiResult};

/// Genre as sent by the client: one raw value (normally a JSON-encoded list)
/// or several repeated form fields.
#[derive(Debug, Clone, PartialEq)]
pub enum GenreInput {
    Raw(String),
    List(Vec<String>),
}

impl GenreInput {
    /// Add another occurrence of the `genre` field.
    pub fn push(self, value: String) -> Self {
        match self {
            Self::Raw(first) => Self::List(vec![first, value]),
            Self::List(mut values) => {
                values.push(value);
                Self::List(values)
            }
        }
    }

    /// A raw value that is not a JSON list of strings becomes a one-element
    /// list, an empty raw value an empty list.
    pub fn resolve(self) -> Vec<String> {
        match self {
            Self::List(values) => values,
            Self::Raw(raw) if raw.trim().is_empty() => Vec::new(),
            Self::Raw(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(serde_json::Value::Array(items)) => items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
                Ok(serde_json::Value::String(s)) => vec![s],
                _ => {
                    debug!("Genre {:?} is not a JSON list, keeping it as one genre", raw);
                    vec![raw]
                }
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct BookForm {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<GenreInput>,
    pub year: Option<String>,
    pub description: Option<String>,
    pub rating: Option<String>,
    pub favorite: Option<String>,
    pub source: Option<String>,
    pub google_id: Option<String>,
    pub cover_url: Option<String>,
    pub remove_cover: Option<String>,
    /// Cover already written to the asset store while the request body was
    /// read. Removed with the form unless the consumer keeps it.
    pub uploaded_cover: Option<PendingAsset>,
}

impl BookForm {
    /// Overlay the fields that were sent onto `row`.
    pub fn apply_to(&self, row: &mut BookRow) -> ApiResult<()> {
        if let Some(title) = &self.title {
            row.title = required(title, "Title")?;
        }
        if let Some(author) = &self.author {
            row.author = required(author, "Author")?;
        }
        if let Some(genre) = &self.genre {
            row.genre = genre.clone().resolve();
        }
        if let Some(year) = &self.year {
            row.year = parse_year(year)?.map(i64::from);
        }
        if let Some(description) = &self.description {
            row.description = description.clone();
        }
        // A blank rating keeps what is there.
        if let Some(rating) = self.rating.as_deref().map(parse_rating).transpose()?.flatten() {
            row.rating = rating;
        }
        if let Some(favorite) = &self.favorite {
            row.favorite = parse_flag(favorite, "favorite")?;
        }

        let source = match self.source.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s
                .parse::<Provenance>()
                .map_err(|e| ApiError::Validation(e.to_string()))?,
            _ => row.source.parse().unwrap_or_default(),
        };
        row.source = source.to_string();
        match source {
            Provenance::Manual => row.google_id = None,
            Provenance::Online => {
                if let Some(google_id) = &self.google_id {
                    let google_id = google_id.trim();
                    row.google_id = (!google_id.is_empty()).then(|| google_id.to_string());
                }
            }
        }

        Ok(())
    }

    /// Both title and author must be present for a new book.
    pub fn check_required(&self) -> ApiResult<()> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if present(&self.title) && present(&self.author) {
            Ok(())
        } else {
            Err(ApiError::Validation("Title and author are required".into()))
        }
    }

    pub fn cover_url(&self) -> Option<&str> {
        self.cover_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    pub fn remove_cover(&self) -> ApiResult<bool> {
        self.remove_cover
            .as_deref()
            .map(|v| parse_flag(v, "removeCover"))
            .transpose()
            .map(|v| v.unwrap_or(false))
    }
}

fn required(value: &str, name: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::Validation(format!("{name} cannot be empty")));
    }
    Ok(value.to_string())
}

/// Blank means "no year".
pub fn parse_year(raw: &str) -> ApiResult<Option<i32>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| ApiError::Validation(format!("Year must be a whole number, got '{raw}'")))
}

/// Blank means "not given". Anything else must be a finite number in 0–5.
pub fn parse_rating(raw: &str) -> ApiResult<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(r) if r.is_finite() && (0.0..=5.0).contains(&r) => Ok(Some(r)),
        _ => Err(ApiError::Validation(format!(
            "Rating must be a number between 0 and 5, got '{raw}'"
        ))),
    }
}

pub fn parse_flag(raw: &str, name: &str) -> ApiResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(ApiError::Validation(format!(
            "{name} must be true or false, got '{other}'"
        ))),
    }
}

/// Read a multipart book form. A `coverImage` file part is streamed straight
/// into the asset store; if anything later in the body fails, the form and the
/// stored file with it are dropped.
pub async fn read_book_form(mut multipart: Multipart, assets: &AssetStore) -> ApiResult<BookForm> {
    let mut form = BookForm::default();
    read_fields(&mut multipart, assets, &mut form).await?;
    Ok(form)
}

async fn read_fields(
    multipart: &mut Multipart,
    assets: &AssetStore,
    form: &mut BookForm,
) -> ApiResult<()> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "coverImage" {
            let file_name = field.file_name().map(str::to_string);
            // Browsers send an empty part when no file was picked.
            if file_name.as_deref().is_none_or(str::is_empty) {
                field.bytes().await?;
                continue;
            }
            if form.uploaded_cover.is_some() {
                return Err(ApiError::Validation("Unexpected field: coverImage".into()));
            }
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let stored = assets
                .store_upload(field, &content_type, file_name.as_deref(), None)
                .await?;
            form.uploaded_cover = Some(stored);
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "title" => form.title = Some(value),
            "author" => form.author = Some(value),
            "genre" => {
                form.genre = Some(match form.genre.take() {
                    Some(existing) => existing.push(value),
                    None => GenreInput::Raw(value),
                })
            }
            "year" => form.year = Some(value),
            "description" => form.description = Some(value),
            "rating" => form.rating = Some(value),
            "favorite" => form.favorite = Some(value),
            "source" => form.source = Some(value),
            "googleId" => form.google_id = Some(value),
            "coverUrl" => form.cover_url = Some(value),
            "removeCover" => form.remove_cover = Some(value),
            other => debug!("Ignoring unknown form field {:?}", other),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_row() -> BookRow {
        BookRow {
            id: "b".into(),
            user_id: "u".into(),
            title: "Old title".into(),
            author: "Old author".into(),
            genre: vec!["Old".into()],
            year: Some(2001),
            description: "Old description".into(),
            rating: 3.5,
            favorite: false,
            cover_image: None,
            source: "online".into(),
            google_id: Some("g-1".into()),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn genre_json_list_round_trips() {
        let genres = GenreInput::Raw(r#"["Fiction","Mystery"]"#.into()).resolve();
        assert_eq!(genres, vec!["Fiction", "Mystery"]);
    }

    #[test]
    fn genre_bare_string_becomes_single_element() {
        assert_eq!(GenreInput::Raw("Fiction".into()).resolve(), vec!["Fiction"]);
        assert_eq!(GenreInput::Raw(r#"["Fiction""#.into()).resolve(), vec![r#"["Fiction""#]);
        assert_eq!(GenreInput::Raw(r#""Poetry""#.into()).resolve(), vec!["Poetry"]);
        assert!(GenreInput::Raw("  ".into()).resolve().is_empty());
    }

    #[test]
    fn repeated_genre_fields_keep_order_and_duplicates() {
        let genre = GenreInput::Raw("Drama".into()).push("Drama".into()).push("Comedy".into());
        assert_eq!(genre.resolve(), vec!["Drama", "Drama", "Comedy"]);
    }

    #[test]
    fn year_and_rating_reject_garbage() {
        assert_eq!(parse_year(" 1999 ").unwrap(), Some(1999));
        assert_eq!(parse_year("").unwrap(), None);
        assert!(parse_year("nineteen").is_err());
        assert!(parse_year("1999.5").is_err());

        assert_eq!(parse_rating("4.5").unwrap(), Some(4.5));
        assert_eq!(parse_rating("").unwrap(), None);
        assert!(parse_rating("five").is_err());
        assert!(parse_rating("NaN").is_err());
        assert!(parse_rating("5.1").is_err());
        assert!(parse_rating("-1").is_err());
    }

    #[test]
    fn flags() {
        assert!(parse_flag("true", "favorite").unwrap());
        assert!(parse_flag("ON", "favorite").unwrap());
        assert!(!parse_flag("false", "favorite").unwrap());
        assert!(!parse_flag("", "favorite").unwrap());
        assert!(parse_flag("maybe", "favorite").is_err());
    }

    #[test]
    fn omitted_fields_are_preserved() {
        let mut row = blank_row();
        let form = BookForm {
            favorite: Some("true".into()),
            ..Default::default()
        };
        form.apply_to(&mut row).unwrap();

        assert!(row.favorite);
        assert_eq!(row.rating, 3.5);
        assert_eq!(row.title, "Old title");
        assert_eq!(row.genre, vec!["Old"]);
        assert_eq!(row.year, Some(2001));
        assert_eq!(row.google_id.as_deref(), Some("g-1"));
    }

    #[test]
    fn blank_rating_keeps_value_but_blank_year_clears() {
        let mut row = blank_row();
        let form = BookForm {
            rating: Some(" ".into()),
            year: Some(String::new()),
            ..Default::default()
        };
        form.apply_to(&mut row).unwrap();
        assert_eq!(row.rating, 3.5);
        assert_eq!(row.year, None);
    }

    #[test]
    fn switching_to_manual_drops_catalog_id() {
        let mut row = blank_row();
        let form = BookForm {
            source: Some("manual".into()),
            google_id: Some("ignored".into()),
            ..Default::default()
        };
        form.apply_to(&mut row).unwrap();
        assert_eq!(row.source, "manual");
        assert_eq!(row.google_id, None);
    }

    #[test]
    fn blank_title_and_bad_source_are_rejected() {
        let mut row = blank_row();
        let form = BookForm {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(form.apply_to(&mut row), Err(ApiError::Validation(_))));

        let form = BookForm {
            source: Some("library".into()),
            ..Default::default()
        };
        assert!(matches!(form.apply_to(&mut row), Err(ApiError::Validation(_))));
    }

    #[test]
    fn required_fields_for_create() {
        let form = BookForm {
            title: Some("Dune".into()),
            ..Default::default()
        };
        assert!(form.check_required().is_err());
        let form = BookForm {
            title: Some("Dune".into()),
            author: Some("Frank Herbert".into()),
            ..Default::default()
        };
        assert!(form.check_required().is_ok());
    }
}
