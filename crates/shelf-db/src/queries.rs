use crate::Database;
use crate::models::{BookRow, UserRow};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

const BOOK_COLUMNS: &str = "id, user_id, title, author, genre, year, description, rating, favorite, \
     cover_image, source, google_id, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.email,
                    user.password,
                    user.created_at,
                    user.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Whether any account already uses `username` or `email`.
    pub fn user_exists(&self, username: &str, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE username = ?1 OR email = ?2",
                [username, email],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Books --

    pub fn insert_book(&self, book: &BookRow) -> Result<()> {
        let genre = serde_json::to_string(&book.genre)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO books (id, user_id, title, author, genre, year, description, rating,
                                    favorite, cover_image, source, google_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                rusqlite::params![
                    book.id,
                    book.user_id,
                    book.title,
                    book.author,
                    genre,
                    book.year,
                    book.description,
                    book.rating,
                    book.favorite,
                    book.cover_image,
                    book.source,
                    book.google_id,
                    book.created_at,
                    book.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// All books owned by `user_id`, newest first.
    pub fn list_books(&self, user_id: &str) -> Result<Vec<BookRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {BOOK_COLUMNS} FROM books
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], book_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Owner-scoped lookup: a book belonging to someone else is `None`.
    pub fn get_book(&self, id: &str, user_id: &str) -> Result<Option<BookRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1 AND user_id = ?2");
            let row = conn
                .query_row(&sql, [id, user_id], book_from_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Overwrites the mutable columns of the book matching both `id` and
    /// `user_id`. `cover_image` is written only when `replace_cover` is set.
    ///
    /// Returns the cover the row held just before the write, read in the same
    /// transaction, or `None` when no such row exists.
    pub fn update_book(&self, book: &BookRow, replace_cover: bool) -> Result<Option<Option<String>>> {
        let genre = serde_json::to_string(&book.genre)?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(previous) = current_cover(&tx, &book.id, &book.user_id)? else {
                return Ok(None);
            };

            let cover = if replace_cover {
                book.cover_image.clone()
            } else {
                previous.clone()
            };
            tx.execute(
                "UPDATE books
                 SET title = ?3, author = ?4, genre = ?5, year = ?6, description = ?7,
                     rating = ?8, favorite = ?9, cover_image = ?10, source = ?11,
                     google_id = ?12, updated_at = ?13
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![
                    book.id,
                    book.user_id,
                    book.title,
                    book.author,
                    genre,
                    book.year,
                    book.description,
                    book.rating,
                    book.favorite,
                    cover,
                    book.source,
                    book.google_id,
                    book.updated_at,
                ],
            )?;
            tx.commit()?;
            Ok(Some(previous))
        })
    }

    /// Deletes the book matching both `id` and `user_id` and returns the cover
    /// it referenced, or `None` when no such row exists.
    pub fn delete_book(&self, id: &str, user_id: &str) -> Result<Option<Option<String>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(cover) = current_cover(&tx, id, user_id)? else {
                return Ok(None);
            };
            tx.execute("DELETE FROM books WHERE id = ?1 AND user_id = ?2", [id, user_id])?;
            tx.commit()?;
            Ok(Some(cover))
        })
    }
}

fn current_cover(conn: &Connection, id: &str, user_id: &str) -> Result<Option<Option<String>>> {
    let cover = conn
        .query_row(
            "SELECT cover_image FROM books WHERE id = ?1 AND user_id = ?2",
            [id, user_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(cover)
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, email, password, created_at, updated_at FROM users WHERE {column} = ?1"
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<BookRow> {
    let genre_json: String = row.get(4)?;
    let genre: Vec<String> = serde_json::from_str(&genre_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(BookRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        genre,
        year: row.get(5)?,
        description: row.get(6)?,
        rating: row.get(7)?,
        favorite: row.get(8)?,
        cover_image: row.get(9)?,
        source: row.get(10)?,
        google_id: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
