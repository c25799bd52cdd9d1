//! Book repository: ownership-scoped CRUD over the books table plus the
//! cover asset lifecycle.
//!
//! Every query filters on both the book id and the caller's id, so another
//! user's book is indistinguishable from a missing one. Cover files follow
//! one rule: a new asset is kept only by the same blocking call that commits
//! the row referencing it, and the cover a commit displaced (as read inside
//! that commit's transaction) is deleted by that same call. A request that
//! fails or is abandoned before the commit drops its new asset.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use shelf_assets::{AssetStore, DEFAULT_DOWNLOAD_TIMEOUT, PendingAsset};
use shelf_db::Database;
use shelf_db::models::BookRow;
use shelf_types::models::{Book, Provenance};

use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::form::BookForm;
use crate::rows::{book_from_row, timestamp};

const BOOK_NOT_FOUND: &str = "Book not found";

#[derive(Clone)]
pub struct BookRepository {
    db: Arc<Database>,
    assets: Arc<AssetStore>,
    download_timeout: Duration,
}

impl BookRepository {
    pub fn new(db: Arc<Database>, assets: Arc<AssetStore>) -> Self {
        Self {
            db,
            assets,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Newest first.
    pub async fn list(&self, owner: Uuid) -> ApiResult<Vec<Book>> {
        let db = self.db.clone();
        let owner = owner.to_string();
        let rows = blocking(move || db.list_books(&owner)).await?;

        let mut books = Vec::with_capacity(rows.len());
        for row in rows {
            books.push(self.to_book(row).await?);
        }
        Ok(books)
    }

    pub async fn get(&self, owner: Uuid, id: &str) -> ApiResult<Book> {
        let row = self.find(owner, id).await?.ok_or_else(not_found)?;
        self.to_book(row).await
    }

    pub async fn create(&self, owner: Uuid, mut form: BookForm) -> ApiResult<Book> {
        form.check_required()?;

        let now = timestamp(Utc::now());
        let mut row = BookRow {
            id: Uuid::new_v4().to_string(),
            user_id: owner.to_string(),
            title: String::new(),
            author: String::new(),
            genre: Vec::new(),
            year: None,
            description: String::new(),
            rating: 0.0,
            favorite: false,
            cover_image: None,
            source: Provenance::Manual.to_string(),
            google_id: None,
            created_at: now.clone(),
            updated_at: now,
        };
        form.apply_to(&mut row)?;

        let cover = self.new_cover(&mut form).await;
        row.cover_image = cover.as_ref().map(|c| c.name().to_string());

        let db = self.db.clone();
        let stored = row.clone();
        blocking(move || {
            db.insert_book(&stored)?;
            if let Some(cover) = cover {
                cover.keep();
            }
            Ok(())
        })
        .await?;

        info!("Created book {} for user {}", row.id, owner);
        self.to_book(row).await
    }

    pub async fn update(&self, owner: Uuid, id: &str, mut form: BookForm) -> ApiResult<Book> {
        let mut row = self.find(owner, id).await?.ok_or_else(not_found)?;
        let remove_cover = form.remove_cover()?;
        form.apply_to(&mut row)?;

        let cover = self.new_cover(&mut form).await;
        let replace_cover = cover.is_some() || remove_cover;
        row.cover_image = cover.as_ref().map(|c| c.name().to_string());
        row.updated_at = timestamp(Utc::now());

        let db = self.db.clone();
        let assets = self.assets.clone();
        let stored = row.clone();
        let current = blocking(move || {
            let Some(previous) = db.update_book(&stored, replace_cover)? else {
                return Ok(None);
            };
            if let Some(cover) = cover {
                cover.keep();
            }
            if !replace_cover {
                return Ok(Some(previous));
            }
            if let Some(old) = previous.filter(|old| stored.cover_image.as_ref() != Some(old)) {
                assets.delete(&old);
            }
            Ok(Some(stored.cover_image))
        })
        .await?
        .ok_or_else(not_found)?;

        row.cover_image = current;
        info!("Updated book {} for user {}", row.id, owner);
        self.to_book(row).await
    }

    /// Row first, then the cover file.
    pub async fn delete(&self, owner: Uuid, id: &str) -> ApiResult<()> {
        // A malformed id cannot name any book.
        let id = id.parse::<Uuid>().map_err(|_| not_found())?.to_string();

        let db = self.db.clone();
        let assets = self.assets.clone();
        let user_id = owner.to_string();
        let book_id = id.clone();
        let deleted = blocking(move || {
            let Some(cover) = db.delete_book(&book_id, &user_id)? else {
                return Ok(false);
            };
            if let Some(cover) = cover {
                assets.delete(&cover);
            }
            Ok(true)
        })
        .await?;

        if !deleted {
            return Err(not_found());
        }
        info!("Deleted book {} for user {}", id, owner);
        Ok(())
    }

    async fn find(&self, owner: Uuid, id: &str) -> ApiResult<Option<BookRow>> {
        let Ok(id) = id.parse::<Uuid>() else {
            return Ok(None);
        };
        let db = self.db.clone();
        let (id, owner) = (id.to_string(), owner.to_string());
        blocking(move || db.get_book(&id, &owner)).await
    }

    async fn to_book(&self, row: BookRow) -> ApiResult<Book> {
        let cover_present = match &row.cover_image {
            Some(name) => self.assets.exists(name).await,
            None => true,
        };
        book_from_row(row, cover_present)
    }

    /// The uploaded cover, else one fetched from `coverUrl`.
    async fn new_cover(&self, form: &mut BookForm) -> Option<PendingAsset> {
        if let Some(upload) = form.uploaded_cover.take() {
            return Some(upload);
        }
        let url = form.cover_url()?;
        // Failures only cost the cover, never the request.
        match self.assets.store_from_url(url, self.download_timeout).await {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!("Cover download from {} failed: {}", url, e);
                None
            }
        }
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound(BOOK_NOT_FOUND.into())
}
