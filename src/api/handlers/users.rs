use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{AuthUser, LoginActivity, UserRole, UserSummary},
    services::users::{UserList, UserService},
    AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub search_term: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<UserList>> {
    let list = UserService::new(state.db.clone())
        .list(query.page, query.limit, query.search_term.as_deref())
        .await?;

    Ok(Json(list))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserSummary>> {
    let user = UserService::new(state.db.clone()).get(user_id).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub profile_pic: Option<String>,
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<UserSummary>> {
    let user = UserService::new(state.db.clone())
        .update(&actor, user_id, req.name.as_deref(), req.profile_pic.as_deref())
        .await?;

    Ok(Json(user))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    UserService::new(state.db.clone()).delete(user_id).await?;

    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default = "default_activity_limit")]
    pub limit: i64,
}

fn default_activity_limit() -> i64 {
    20
}

pub async fn login_activities(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<Vec<LoginActivity>>> {
    let activities = UserService::new(state.db.clone())
        .login_activities(user_id, query.limit)
        .await?;

    Ok(Json(activities))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

pub async fn update_user_role(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> AppResult<Json<UserSummary>> {
    let user = UserService::new(state.db.clone())
        .update_role(user_id, req.role)
        .await?;

    Ok(Json(user))
}
