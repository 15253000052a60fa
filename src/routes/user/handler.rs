use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
};

use crate::AppState;
use crate::database::UserStore;
use crate::error::UserError;
use crate::models::{User, UserId};
use crate::remote::UserSource;
use crate::routes::ApiResponse;

use super::model::{UserIdPath, UserRequest};

type ApiResult<T> = Result<Json<ApiResponse<T>>, UserError>;

pub async fn list_users<R: UserSource, S: UserStore>(
    State(state): State<AppState<R, S>>,
) -> ApiResult<Vec<User>> {
    let users = state.users.list().await?;
    Ok(Json(ApiResponse::success(users)))
}

pub async fn get_user<R: UserSource, S: UserStore>(
    State(state): State<AppState<R, S>>,
    UserIdPath(id): UserIdPath,
) -> ApiResult<User> {
    let user = state.users.lookup(id).await?;
    Ok(Json(ApiResponse::success(Arc::unwrap_or_clone(user))))
}

pub async fn create_user<R: UserSource, S: UserStore>(
    State(state): State<AppState<R, S>>,
    Json(req): Json<UserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), UserError> {
    let user = state.users.create(req.into_user(UserId(0))).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Arc::unwrap_or_clone(user))),
    ))
}

pub async fn update_user<R: UserSource, S: UserStore>(
    State(state): State<AppState<R, S>>,
    UserIdPath(id): UserIdPath,
    Json(req): Json<UserRequest>,
) -> ApiResult<User> {
    let user = state.users.update(id, req.into_user(id)).await?;
    Ok(Json(ApiResponse::success(Arc::unwrap_or_clone(user))))
}

pub async fn delete_user<R: UserSource, S: UserStore>(
    State(state): State<AppState<R, S>>,
    UserIdPath(id): UserIdPath,
) -> ApiResult<User> {
    let user = state.users.delete(id).await?;
    Ok(Json(ApiResponse::success(user)))
}
