use axum::{
    Extension, Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};

use shelf_types::api::{Claims, MessageResponse};
use shelf_types::models::Book;

use crate::AppState;
use crate::error::ApiResult;
use crate::form::read_book_form;

/// GET /api/books
pub async fn list_books(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Book>>> {
    Ok(Json(state.books.list(claims.sub).await?))
}

/// GET /api/books/{id}
pub async fn get_book(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<Json<Book>> {
    Ok(Json(state.books.get(claims.sub, &id).await?))
}

/// POST /api/books: multipart form, optional `coverImage` file or `coverUrl`.
pub async fn create_book(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let form = read_book_form(multipart?, &state.assets).await?;
    let book = state.books.create(claims.sub, form).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// PUT /api/books/{id}: same fields as create, all optional.
pub async fn update_book(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Book>> {
    let form = read_book_form(multipart?, &state.assets).await?;
    Ok(Json(state.books.update(claims.sub, &id, form).await?))
}

/// DELETE /api/books/{id}
pub async fn delete_book(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.books.delete(claims.sub, &id).await?;
    Ok(Json(MessageResponse {
        message: "Book deleted".into(),
    }))
}
