use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{AggregateDraft, AggregateUpdate, Kind, LineItemBatch, ListQuery},
    state::AppState,
};

pub async fn create_handler(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<Kind>,
    Json(draft): Json<AggregateDraft>,
) -> Result<impl IntoResponse, AppError> {
    let aggregate = state.aggregates.create(kind, draft).await?;
    Ok((StatusCode::CREATED, Json(aggregate)))
}

pub async fn list_handler(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<Kind>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.aggregates.list(kind, &query).await?))
}

pub async fn get_handler(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<Kind>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.aggregates.get(kind, id).await?))
}

pub async fn update_handler(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<Kind>,
    Path(id): Path<Uuid>,
    Json(update): Json<AggregateUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.aggregates.update(kind, id, &update).await?;

    Ok(Json(json!({
        "id": outcome.aggregate.id,
        "status": outcome.aggregate.status,
        "notified": outcome.notified,
    })))
}

pub async fn delete_handler(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<Kind>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.aggregates.delete(kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_equipments_handler(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<Kind>,
    Path(id): Path<Uuid>,
    Json(batch): Json<LineItemBatch>,
) -> Result<impl IntoResponse, AppError> {
    let items = state.aggregates.add_line_items(kind, id, batch).await?;
    Ok((StatusCode::CREATED, Json(items)))
}

pub async fn equipments_handler(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<Kind>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.aggregates.line_items(kind, id).await?))
}
