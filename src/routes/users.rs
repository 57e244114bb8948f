use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{AdminUser, hash_password},
    error::AppError,
    models::{User, UserDraft, UserView},
    state::AppState,
    utils::is_valid_email,
};

const MIN_PASSWORD_CHARS: usize = 8;

pub async fn create_handler(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Json(draft): Json<UserDraft>,
) -> Result<impl IntoResponse, AppError> {
    let username = draft.username.trim();
    if username.is_empty() {
        return Err(AppError::MalformedPayload("username is required".to_string()));
    }
    if !is_valid_email(&draft.email) {
        return Err(AppError::MalformedPayload(
            "email is not a valid email".to_string(),
        ));
    }
    if draft.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::MalformedPayload(format!(
            "password needs at least {MIN_PASSWORD_CHARS} characters"
        )));
    }

    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: draft.email.trim().to_string(),
        password_hash: hash_password(&draft.password)?,
        role: draft.role,
        created_at: Utc::now(),
    };
    state.repository.insert_user(&user).await?;

    info!(by = %admin.username, username = %user.username, role = ?user.role, "User created");
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

pub async fn list_handler(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let users = state.repository.list_users().await?;
    Ok(Json(users.iter().map(UserView::from).collect::<Vec<_>>()))
}

pub async fn delete_handler(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if id == admin.sub {
        return Err(AppError::MalformedPayload(
            "cannot delete your own account".to_string(),
        ));
    }
    if !state.repository.delete_user(id).await? {
        return Err(AppError::NotFound("User"));
    }

    info!(by = %admin.username, %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
