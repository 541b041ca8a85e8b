use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use model::entities::tag;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::schemas::{ApiResponse, AppState, CallerId};

/// Request body for creating a tag
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateTagRequest {
    /// Tag name, unique per user
    pub name: String,
}

/// Tag response model
#[derive(Debug, Serialize, ToSchema)]
pub struct TagResponse {
    pub id: i32,
    pub name: String,
}

impl From<tag::Model> for TagResponse {
    fn from(model: tag::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

/// Create a tag
#[utoipa::path(
    post,
    path = "/api/v1/tags",
    tag = "tags",
    request_body = CreateTagRequest,
    responses(
        (status = 201, description = "Tag created", body = ApiResponse<TagResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Tag name already taken", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_tag(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TagResponse>>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::validation("tag name must not be empty"));
    }

    let taken = tag::Entity::find()
        .filter(tag::Column::UserId.eq(user_id))
        .filter(tag::Column::Name.eq(request.name.as_str()))
        .one(&state.db)
        .await?;
    if taken.is_some() {
        return Err(ApiError::conflict(format!(
            "tag '{}' already exists",
            request.name
        )));
    }

    let created = tag::ActiveModel {
        user_id: Set(user_id),
        name: Set(request.name),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Tag {} created", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            TagResponse::from(created),
            "Tag created successfully",
        )),
    ))
}

/// List tags for the calling user
#[utoipa::path(
    get,
    path = "/api/v1/tags",
    tag = "tags",
    responses(
        (status = 200, description = "Tags retrieved successfully", body = ApiResponse<Vec<TagResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_tags(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<Vec<TagResponse>>>, ApiError> {
    let tags = tag::Entity::find()
        .filter(tag::Column::UserId.eq(user_id))
        .order_by_asc(tag::Column::Name)
        .all(&state.db)
        .await?;

    let data: Vec<TagResponse> = tags.into_iter().map(TagResponse::from).collect();
    Ok(Json(ApiResponse::new(data, "Tags retrieved successfully")))
}
