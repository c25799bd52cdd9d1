//! HTTP surface of the book library: auth, books, insights.

pub mod auth;
pub mod books;
pub mod credentials;
pub mod error;
pub mod form;
pub mod insights;
pub mod middleware;
pub mod repository;
mod rows;
pub mod token;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use shelf_assets::{AssetStore, MAX_ASSET_SIZE};
use shelf_db::Database;
use shelf_insights::InsightGenerator;

use crate::credentials::{CredentialStore, HashCost};
use crate::error::{ApiError, ApiResult};
use crate::repository::BookRepository;
use crate::token::TokenService;

/// Room for the form fields around a maximum-size cover, so the asset
/// store's own limit is the one that trips.
const BOOK_BODY_LIMIT: usize = MAX_ASSET_SIZE as usize + 3 * 1024 * 1024;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub assets: Arc<AssetStore>,
    pub tokens: TokenService,
    pub credentials: CredentialStore,
    pub books: BookRepository,
    pub insights: InsightGenerator,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        assets: Arc<AssetStore>,
        tokens: TokenService,
        hash_cost: HashCost,
        insights: InsightGenerator,
    ) -> anyhow::Result<AppState> {
        Ok(Arc::new(Self {
            credentials: CredentialStore::new(db.clone(), hash_cost)?,
            books: BookRepository::new(db, assets.clone()),
            assets,
            tokens,
            insights,
        }))
    }
}

/// Run a synchronous DB or hashing call on the blocking pool.
pub(crate) async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("spawn_blocking join error: {e}")))?
        .map_err(ApiError::from)
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/auth/profile", get(auth::profile))
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/{id}",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/summarize", post(insights::summarize))
        .layer(DefaultBodyLimit::max(BOOK_BODY_LIMIT))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let api = Router::new().merge(public_routes).merge(protected_routes);

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(state.assets.dir()))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".into())
}
