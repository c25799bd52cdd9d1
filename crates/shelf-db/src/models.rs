/// Database row types. These map directly to SQLite rows.
/// Distinct from shelf-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub genre: Vec<String>,
    pub year: Option<i64>,
    pub description: String,
    pub rating: f64,
    pub favorite: bool,
    pub cover_image: Option<String>,
    pub source: String,
    pub google_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
