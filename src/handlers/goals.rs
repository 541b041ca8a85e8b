use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use model::entities::{account, goal};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::schemas::{ApiResponse, AppState, CallerId};

/// Request body for creating a savings goal
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateGoalRequest {
    /// Goal name
    pub name: String,
    /// Amount to save towards
    pub target_amount: Decimal,
    /// Amount already saved (default 0)
    pub current_amount: Option<Decimal>,
    /// Account whose balance funds the goal
    pub linked_account_id: Option<i32>,
    /// Date the goal should be reached by
    pub target_date: Option<NaiveDate>,
}

/// Savings goal response model
#[derive(Debug, Serialize, ToSchema)]
pub struct GoalResponse {
    pub id: i32,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub linked_account_id: Option<i32>,
    pub target_date: Option<NaiveDate>,
}

impl From<goal::Model> for GoalResponse {
    fn from(model: goal::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            target_amount: model.target_amount,
            current_amount: model.current_amount,
            linked_account_id: model.linked_account_id,
            target_date: model.target_date,
        }
    }
}

/// Create a savings goal
#[utoipa::path(
    post,
    path = "/api/v1/goals",
    tag = "goals",
    request_body = CreateGoalRequest,
    responses(
        (status = 201, description = "Goal created", body = ApiResponse<GoalResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Linked account not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_goal(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GoalResponse>>), ApiError> {
    debug!("Creating goal '{}' for user {}", request.name, user_id);

    if request.name.trim().is_empty() {
        return Err(ApiError::validation("goal name must not be empty"));
    }
    if request.target_amount <= Decimal::ZERO {
        return Err(ApiError::validation("target_amount must be positive"));
    }
    let current = request.current_amount.unwrap_or(Decimal::ZERO);
    if current < Decimal::ZERO {
        return Err(ApiError::validation("current_amount must not be negative"));
    }
    if let Some(account_id) = request.linked_account_id {
        account::Entity::find_by_id(account_id)
            .filter(account::Column::UserId.eq(user_id))
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("account {account_id}")))?;
    }

    let created = goal::ActiveModel {
        user_id: Set(user_id),
        name: Set(request.name),
        target_amount: Set(request.target_amount),
        current_amount: Set(current),
        linked_account_id: Set(request.linked_account_id),
        target_date: Set(request.target_date),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Goal {} created", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            GoalResponse::from(created),
            "Goal created successfully",
        )),
    ))
}

/// List savings goals for the calling user
#[utoipa::path(
    get,
    path = "/api/v1/goals",
    tag = "goals",
    responses(
        (status = 200, description = "Goals retrieved successfully", body = ApiResponse<Vec<GoalResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_goals(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<Vec<GoalResponse>>>, ApiError> {
    let goals = goal::Entity::find()
        .filter(goal::Column::UserId.eq(user_id))
        .order_by_asc(goal::Column::Id)
        .all(&state.db)
        .await?;

    let data: Vec<GoalResponse> = goals.into_iter().map(GoalResponse::from).collect();
    Ok(Json(ApiResponse::new(data, "Goals retrieved successfully")))
}

/// Request body for updating a savings goal; omitted fields keep their value
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateGoalRequest {
    pub name: Option<String>,
    pub target_amount: Option<Decimal>,
    pub current_amount: Option<Decimal>,
    pub target_date: Option<NaiveDate>,
}

/// Update a savings goal
#[utoipa::path(
    put,
    path = "/api/v1/goals/{goal_id}",
    tag = "goals",
    params(
        ("goal_id" = i32, Path, description = "Goal ID"),
    ),
    request_body = UpdateGoalRequest,
    responses(
        (status = 200, description = "Goal updated", body = ApiResponse<GoalResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Goal not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_goal(
    Path(goal_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<UpdateGoalRequest>,
) -> Result<Json<ApiResponse<GoalResponse>>, ApiError> {
    let existing = goal::Entity::find_by_id(goal_id)
        .filter(goal::Column::UserId.eq(user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("goal {goal_id}")))?;

    let mut active: goal::ActiveModel = existing.into();
    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(ApiError::validation("goal name must not be empty"));
        }
        active.name = Set(name);
    }
    if let Some(target) = request.target_amount {
        if target <= Decimal::ZERO {
            return Err(ApiError::validation("target_amount must be positive"));
        }
        active.target_amount = Set(target);
    }
    if let Some(current) = request.current_amount {
        if current < Decimal::ZERO {
            return Err(ApiError::validation("current_amount must not be negative"));
        }
        active.current_amount = Set(current);
    }
    if let Some(date) = request.target_date {
        active.target_date = Set(Some(date));
    }

    let updated = active.update(&state.db).await?;
    info!("Goal {} updated", updated.id);
    Ok(Json(ApiResponse::new(
        GoalResponse::from(updated),
        "Goal updated successfully",
    )))
}
