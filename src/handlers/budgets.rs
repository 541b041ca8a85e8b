use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, NaiveDateTime};
use ledger::alerts;
use model::entities::{budget, budget_alert_threshold, category};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::handlers::transactions::TriggeredAlertResponse;
use crate::schemas::{ApiResponse, AppState, CallerId};

/// Request body for creating a monthly budget
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateBudgetRequest {
    /// Category the budget limits
    pub category_id: i32,
    /// Budget month as YYYY-MM
    pub month: String,
    /// Budget amount; zero is allowed and never fires alerts
    pub amount: Decimal,
    /// Roll unspent amount into the next month (informational)
    pub rollover: Option<bool>,
    /// Alert thresholds as percentages of the budget (e.g. [75, 90, 100])
    #[serde(default)]
    pub alert_thresholds: Vec<i32>,
}

/// Query parameters for listing budgets
#[derive(Debug, Deserialize)]
pub struct BudgetQuery {
    /// Restrict to one month (YYYY-MM)
    pub month: Option<String>,
}

/// Budget response model, including live spent figures
#[derive(Debug, Serialize, ToSchema)]
pub struct BudgetResponse {
    pub id: i32,
    pub category_id: i32,
    /// First day of the budget month
    pub month: NaiveDate,
    pub amount: Decimal,
    pub rollover: bool,
    /// Absolute outflow total for the (category, month) so far
    pub spent: Decimal,
    pub thresholds: Vec<ThresholdResponse>,
}

/// One alert threshold and its one-shot state
#[derive(Debug, Serialize, ToSchema)]
pub struct ThresholdResponse {
    pub id: i32,
    pub threshold_percent: i32,
    pub sent: bool,
    pub sent_at: Option<NaiveDateTime>,
}

impl From<budget_alert_threshold::Model> for ThresholdResponse {
    fn from(model: budget_alert_threshold::Model) -> Self {
        Self {
            id: model.id,
            threshold_percent: model.threshold_percent,
            sent: model.sent,
            sent_at: model.sent_at,
        }
    }
}

/// Request body for changing a budget's amount
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateBudgetRequest {
    /// New budget amount; zero is allowed and never fires alerts
    pub amount: Decimal,
}

fn parse_month_param(raw: &str) -> Result<NaiveDate, ApiError> {
    common::parse_month(raw)
        .ok_or_else(|| ApiError::validation(format!("'{raw}' is not a valid YYYY-MM month")))
}

/// Create a monthly budget with alert thresholds
#[utoipa::path(
    post,
    path = "/api/v1/budgets",
    tag = "budgets",
    request_body = CreateBudgetRequest,
    responses(
        (status = 201, description = "Budget created", body = ApiResponse<BudgetResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Budget already exists for this category and month", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_budget(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateBudgetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BudgetResponse>>), ApiError> {
    debug!(
        "Creating budget for category {} in {}",
        request.category_id, request.month
    );

    let month = parse_month_param(&request.month)?;
    if request.amount < Decimal::ZERO {
        return Err(ApiError::validation("budget amount must not be negative"));
    }
    let mut thresholds = request.alert_thresholds.clone();
    thresholds.sort_unstable();
    thresholds.dedup();
    if thresholds.iter().any(|t| *t <= 0) {
        return Err(ApiError::validation(
            "alert thresholds must be positive percentages",
        ));
    }

    category::Entity::find_by_id(request.category_id)
        .filter(category::Column::UserId.eq(user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("category {}", request.category_id)))?;

    let existing = budget::Entity::find()
        .filter(budget::Column::UserId.eq(user_id))
        .filter(budget::Column::CategoryId.eq(request.category_id))
        .filter(budget::Column::Month.eq(month))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(format!(
            "a budget for category {} in {} already exists",
            request.category_id, request.month
        )));
    }

    // The budget and its thresholds commit together.
    let txn = state.db.begin().await?;
    let created = budget::ActiveModel {
        user_id: Set(user_id),
        category_id: Set(request.category_id),
        month: Set(month),
        amount: Set(request.amount),
        rollover: Set(request.rollover.unwrap_or(false)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut threshold_rows = Vec::with_capacity(thresholds.len());
    for percent in thresholds {
        let row = budget_alert_threshold::ActiveModel {
            budget_id: Set(created.id),
            threshold_percent: Set(percent),
            sent: Set(false),
            sent_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        threshold_rows.push(row);
    }
    txn.commit().await?;

    let spent = alerts::spent_in_month(&state.db, user_id, created.category_id, month).await?;

    info!("Budget {} created", created.id);
    let data = BudgetResponse {
        id: created.id,
        category_id: created.category_id,
        month: created.month,
        amount: created.amount,
        rollover: created.rollover,
        spent,
        thresholds: threshold_rows
            .into_iter()
            .map(ThresholdResponse::from)
            .collect(),
    };
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(data, "Budget created successfully")),
    ))
}

/// List budgets for the calling user
#[utoipa::path(
    get,
    path = "/api/v1/budgets",
    tag = "budgets",
    params(
        ("month" = Option<String>, Query, description = "Restrict to one month (YYYY-MM)"),
    ),
    responses(
        (status = 200, description = "Budgets retrieved successfully", body = ApiResponse<Vec<BudgetResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_budgets(
    Query(query): Query<BudgetQuery>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<Vec<BudgetResponse>>>, ApiError> {
    let mut find = budget::Entity::find()
        .filter(budget::Column::UserId.eq(user_id))
        .order_by_asc(budget::Column::Month)
        .order_by_asc(budget::Column::Id);
    if let Some(raw) = query.month.as_deref() {
        find = find.filter(budget::Column::Month.eq(parse_month_param(raw)?));
    }
    let budgets = find.all(&state.db).await?;

    let mut data = Vec::with_capacity(budgets.len());
    for b in budgets {
        let spent = alerts::spent_in_month(&state.db, user_id, b.category_id, b.month).await?;
        let thresholds = budget_alert_threshold::Entity::find()
            .filter(budget_alert_threshold::Column::BudgetId.eq(b.id))
            .order_by_asc(budget_alert_threshold::Column::ThresholdPercent)
            .all(&state.db)
            .await?;
        data.push(BudgetResponse {
            id: b.id,
            category_id: b.category_id,
            month: b.month,
            amount: b.amount,
            rollover: b.rollover,
            spent,
            thresholds: thresholds.into_iter().map(ThresholdResponse::from).collect(),
        });
    }

    Ok(Json(ApiResponse::new(
        data,
        "Budgets retrieved successfully",
    )))
}

/// Re-arm all alert thresholds on a budget
///
/// Cleared thresholds fire again the next time spending reaches them.
#[utoipa::path(
    post,
    path = "/api/v1/budgets/{budget_id}/reset-alerts",
    tag = "budgets",
    params(
        ("budget_id" = i32, Path, description = "Budget ID"),
    ),
    responses(
        (status = 200, description = "Alerts re-armed", body = ApiResponse<u64>),
        (status = 404, description = "Budget not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn reset_budget_alerts(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<u64>>, ApiError> {
    budget::Entity::find_by_id(budget_id)
        .filter(budget::Column::UserId.eq(user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("budget {budget_id}")))?;

    let reset = alerts::reset_alerts(&state.db, budget_id).await?;
    info!("Re-armed {} thresholds on budget {}", reset, budget_id);
    Ok(Json(ApiResponse::new(reset, "Budget alerts re-armed")))
}

/// Change a budget's amount
///
/// The old thresholds no longer describe the new limit, so every alert on
/// the budget is re-armed and evaluated against the new amount going forward.
#[utoipa::path(
    put,
    path = "/api/v1/budgets/{budget_id}",
    tag = "budgets",
    params(
        ("budget_id" = i32, Path, description = "Budget ID"),
    ),
    request_body = UpdateBudgetRequest,
    responses(
        (status = 200, description = "Budget updated", body = ApiResponse<BudgetResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Budget not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_budget(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<UpdateBudgetRequest>,
) -> Result<Json<ApiResponse<BudgetResponse>>, ApiError> {
    if request.amount < Decimal::ZERO {
        return Err(ApiError::validation("budget amount must not be negative"));
    }

    let existing = budget::Entity::find_by_id(budget_id)
        .filter(budget::Column::UserId.eq(user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("budget {budget_id}")))?;

    let amount_changed = existing.amount != request.amount;
    let mut active: budget::ActiveModel = existing.into();
    active.amount = Set(request.amount);
    let updated = active.update(&state.db).await?;

    if amount_changed {
        let reset = alerts::reset_alerts(&state.db, budget_id).await?;
        info!(
            "Budget {} amount changed, re-armed {} thresholds",
            budget_id, reset
        );
    }

    let spent =
        alerts::spent_in_month(&state.db, user_id, updated.category_id, updated.month).await?;
    let thresholds = budget_alert_threshold::Entity::find()
        .filter(budget_alert_threshold::Column::BudgetId.eq(budget_id))
        .order_by_asc(budget_alert_threshold::Column::ThresholdPercent)
        .all(&state.db)
        .await?;

    let data = BudgetResponse {
        id: updated.id,
        category_id: updated.category_id,
        month: updated.month,
        amount: updated.amount,
        rollover: updated.rollover,
        spent,
        thresholds: thresholds.into_iter().map(ThresholdResponse::from).collect(),
    };
    Ok(Json(ApiResponse::new(data, "Budget updated successfully")))
}

/// Evaluate a budget's alert thresholds without recording a transaction
///
/// Useful after imports or resets: any threshold the current spending level
/// crosses fires now and is marked sent.
#[utoipa::path(
    post,
    path = "/api/v1/budgets/{budget_id}/check-alerts",
    tag = "budgets",
    params(
        ("budget_id" = i32, Path, description = "Budget ID"),
    ),
    responses(
        (status = 200, description = "Alerts evaluated", body = ApiResponse<Vec<TriggeredAlertResponse>>),
        (status = 404, description = "Budget not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn check_budget_alerts(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<Vec<TriggeredAlertResponse>>>, ApiError> {
    let target = budget::Entity::find_by_id(budget_id)
        .filter(budget::Column::UserId.eq(user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("budget {budget_id}")))?;

    let triggered =
        alerts::check_alerts(&state.db, user_id, &[target.category_id], target.month).await?;
    let data: Vec<TriggeredAlertResponse> = triggered
        .into_iter()
        .map(TriggeredAlertResponse::from)
        .collect();
    Ok(Json(ApiResponse::new(data, "Budget alerts evaluated")))
}
