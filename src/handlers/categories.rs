use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use model::entities::category;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::schemas::{ApiResponse, AppState, CallerId};

/// Request body for creating a spending category
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateCategoryRequest {
    /// Category name, unique per user
    pub name: String,
}

/// Category response model
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

/// Create a spending category
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Category name already taken", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_category(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponse>>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::validation("category name must not be empty"));
    }

    let taken = category::Entity::find()
        .filter(category::Column::UserId.eq(user_id))
        .filter(category::Column::Name.eq(request.name.as_str()))
        .one(&state.db)
        .await?;
    if taken.is_some() {
        return Err(ApiError::conflict(format!(
            "category '{}' already exists",
            request.name
        )));
    }

    let created = category::ActiveModel {
        user_id: Set(user_id),
        name: Set(request.name),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Category {} created", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            CategoryResponse::from(created),
            "Category created successfully",
        )),
    ))
}

/// List spending categories for the calling user
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "categories",
    responses(
        (status = 200, description = "Categories retrieved successfully", body = ApiResponse<Vec<CategoryResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_categories(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<Vec<CategoryResponse>>>, ApiError> {
    let categories = category::Entity::find()
        .filter(category::Column::UserId.eq(user_id))
        .order_by_asc(category::Column::Name)
        .all(&state.db)
        .await?;

    let data: Vec<CategoryResponse> = categories
        .into_iter()
        .map(CategoryResponse::from)
        .collect();
    Ok(Json(ApiResponse::new(
        data,
        "Categories retrieved successfully",
    )))
}
