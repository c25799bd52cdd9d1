use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public view of an account. The password hash never leaves the DB layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a book record came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Manual,
    Online,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Online => "online",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvenance(pub String);

impl fmt::Display for UnknownProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown source '{}', expected 'manual' or 'online'", self.0)
    }
}

impl std::error::Error for UnknownProvenance {}

impl FromStr for Provenance {
    type Err = UnknownProvenance;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "online" => Ok(Self::Online),
            other => Err(UnknownProvenance(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: Vec<String>,
    pub year: Option<i32>,
    pub description: String,
    pub rating: f64,
    pub favorite: bool,
    /// Filename inside the asset store, served under `/uploads/`.
    pub cover_image: Option<String>,
    pub source: Provenance,
    pub google_id: Option<String>,
    /// Owning user.
    pub user: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Analytical notes about a book produced by the text-generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub key_themes: Vec<String>,
    pub authors_approach: String,
    pub why_read: String,
    pub reading_experience: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_parses_case_insensitively() {
        assert_eq!("Online".parse::<Provenance>(), Ok(Provenance::Online));
        assert_eq!(" manual ".parse::<Provenance>(), Ok(Provenance::Manual));
        assert!("library".parse::<Provenance>().is_err());
    }

    #[test]
    fn insight_uses_camel_case_keys() {
        let insight = Insight {
            key_themes: vec!["Memory".into()],
            authors_approach: "a".into(),
            why_read: "b".into(),
            reading_experience: "c".into(),
        };
        let json = serde_json::to_value(&insight).unwrap();
        assert!(json.get("keyThemes").is_some());
        assert!(json.get("authorsApproach").is_some());
        assert!(json.get("whyRead").is_some());
        assert!(json.get("readingExperience").is_some());
    }
}
