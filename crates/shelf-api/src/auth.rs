use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use shelf_types::api::{AuthResponse, AuthUser, Claims, LoginRequest, SignupRequest};
use shelf_types::models::User;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn signup(
    State(state): State<AppState>,
    req: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = req?;
    let user = state
        .credentials
        .register(&req.username, &req.email, &req.password)
        .await?;

    let body = session(&state, user, "User created successfully")?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn login(
    State(state): State<AppState>,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(req) = req?;
    let user = state.credentials.verify(&req.email, &req.password).await?;
    Ok(Json(session(&state, user, "Login successful")?))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<User>> {
    // A valid token can outlive its account.
    state
        .credentials
        .get(claims.sub)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

fn session(state: &AppState, user: User, message: &str) -> ApiResult<AuthResponse> {
    let token = state
        .tokens
        .issue(user.id, &user.username)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(AuthResponse {
        message: message.to_string(),
        token,
        user: AuthUser {
            id: user.id,
            username: user.username,
            email: user.email,
        },
    })
}
