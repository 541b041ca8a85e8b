use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, Utc};
use ledger::recurrence::{self, Schedule};
use model::entities::account;
use model::entities::recurring_template::{
    self, Frequency, TemplateStatus, LAST_DAY_OF_MONTH,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::schemas::{ApiResponse, AppState, CallerId};

/// Request body for creating a recurring template
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateTemplateRequest {
    /// Account the generated transactions post to
    pub account_id: i32,
    /// Signed amount each occurrence posts; zero is rejected
    pub amount: Decimal,
    /// Payee for generated transactions
    pub payee: String,
    /// Category for generated transactions
    pub category_id: Option<i32>,
    /// daily, weekly, biweekly, monthly or yearly
    pub frequency: String,
    /// Repeat every N periods (default 1)
    pub interval: Option<i32>,
    /// Anchor date; the first occurrence falls strictly after it
    pub start_date: NaiveDate,
    /// Last date occurrences may fall on
    pub end_date: Option<NaiveDate>,
    /// Preferred day of month for monthly/yearly; -1 means last day
    pub day_of_month: Option<i16>,
    /// Preferred weekday for weekly/biweekly (0 = Monday .. 6 = Sunday)
    pub day_of_week: Option<i16>,
}

/// Recurring template response model
#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateResponse {
    pub id: i32,
    pub account_id: i32,
    pub amount: Decimal,
    pub payee: String,
    pub category_id: Option<i32>,
    pub frequency: String,
    pub interval: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub day_of_month: Option<i16>,
    pub day_of_week: Option<i16>,
    pub status: String,
    pub next_scheduled_date: NaiveDate,
    pub last_generated_date: Option<NaiveDate>,
}

impl From<recurring_template::Model> for TemplateResponse {
    fn from(model: recurring_template::Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            amount: model.amount,
            payee: model.payee,
            category_id: model.category_id,
            frequency: frequency_name(model.frequency).to_string(),
            interval: model.interval,
            start_date: model.start_date,
            end_date: model.end_date,
            day_of_month: model.day_of_month,
            day_of_week: model.day_of_week,
            status: status_name(model.status).to_string(),
            next_scheduled_date: model.next_scheduled_date,
            last_generated_date: model.last_generated_date,
        }
    }
}

/// Result of a due-generation pass
#[derive(Debug, Serialize, ToSchema)]
pub struct GenerationReportResponse {
    /// Transactions materialized in this pass
    pub generated: usize,
    /// Templates that reached their end date and completed
    pub completed: usize,
    /// Templates that failed; their siblings were unaffected
    pub failed: Vec<FailedTemplate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FailedTemplate {
    pub template_id: i32,
    pub error: String,
}

/// Query parameters for the generation endpoint
#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    /// Generate everything due up to this date (default: today)
    pub as_of: Option<NaiveDate>,
}

fn frequency_name(f: Frequency) -> &'static str {
    match f {
        Frequency::Daily => "daily",
        Frequency::Weekly => "weekly",
        Frequency::Biweekly => "biweekly",
        Frequency::Monthly => "monthly",
        Frequency::Yearly => "yearly",
    }
}

fn parse_frequency(raw: &str) -> Result<Frequency, ApiError> {
    match raw.to_lowercase().as_str() {
        "daily" => Ok(Frequency::Daily),
        "weekly" => Ok(Frequency::Weekly),
        "biweekly" => Ok(Frequency::Biweekly),
        "monthly" => Ok(Frequency::Monthly),
        "yearly" => Ok(Frequency::Yearly),
        other => Err(ApiError::validation(format!("unknown frequency '{other}'"))),
    }
}

fn status_name(s: TemplateStatus) -> &'static str {
    match s {
        TemplateStatus::Active => "active",
        TemplateStatus::Paused => "paused",
        TemplateStatus::Completed => "completed",
        TemplateStatus::Cancelled => "cancelled",
    }
}

/// Create a recurring template
///
/// The first occurrence falls strictly after the start date; a template
/// whose first occurrence would already exceed its end date is rejected.
#[utoipa::path(
    post,
    path = "/api/v1/recurring-templates",
    tag = "recurring",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = ApiResponse<TemplateResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Account not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_template(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TemplateResponse>>), ApiError> {
    debug!("Creating recurring template for user {}", user_id);

    if request.amount.is_zero() {
        return Err(ApiError::validation("template amount must not be zero"));
    }
    let frequency = parse_frequency(&request.frequency)?;
    let interval = request.interval.unwrap_or(1);
    if interval < 1 {
        return Err(ApiError::validation("interval must be at least 1"));
    }
    if let Some(dom) = request.day_of_month {
        if dom != LAST_DAY_OF_MONTH && !(1..=31).contains(&dom) {
            return Err(ApiError::validation(
                "day_of_month must be 1-31, or -1 for the last day",
            ));
        }
    }
    if let Some(dow) = request.day_of_week {
        if !(0..=6).contains(&dow) {
            return Err(ApiError::validation(
                "day_of_week must be 0 (Monday) through 6 (Sunday)",
            ));
        }
    }
    if let Some(end) = request.end_date {
        if end < request.start_date {
            return Err(ApiError::validation(
                "end_date must not precede start_date",
            ));
        }
    }

    let owned = account::Entity::find_by_id(request.account_id)
        .filter(account::Column::UserId.eq(user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("account {}", request.account_id)))?;
    if !owned.is_active {
        return Err(ApiError::conflict(format!(
            "account {} is archived",
            owned.id
        )));
    }

    let schedule = Schedule {
        frequency,
        interval,
        day_of_month: request.day_of_month,
        day_of_week: request.day_of_week,
    };
    let next = recurrence::first_scheduled_date(&schedule, request.start_date, request.end_date)
        .ok_or_else(|| {
            ApiError::validation("first occurrence would already fall past end_date")
        })?;

    let created = recurring_template::ActiveModel {
        user_id: Set(user_id),
        account_id: Set(request.account_id),
        amount: Set(request.amount),
        payee: Set(request.payee),
        category_id: Set(request.category_id),
        frequency: Set(frequency),
        interval: Set(interval),
        start_date: Set(request.start_date),
        end_date: Set(request.end_date),
        day_of_month: Set(request.day_of_month),
        day_of_week: Set(request.day_of_week),
        status: Set(TemplateStatus::Active),
        next_scheduled_date: Set(next),
        last_generated_date: Set(None),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!(
        "Recurring template {} created, first occurrence {}",
        created.id, created.next_scheduled_date
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            TemplateResponse::from(created),
            "Recurring template created successfully",
        )),
    ))
}

/// List recurring templates for the calling user
#[utoipa::path(
    get,
    path = "/api/v1/recurring-templates",
    tag = "recurring",
    responses(
        (status = 200, description = "Templates retrieved successfully", body = ApiResponse<Vec<TemplateResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_templates(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<Vec<TemplateResponse>>>, ApiError> {
    let templates = recurring_template::Entity::find()
        .filter(recurring_template::Column::UserId.eq(user_id))
        .order_by_asc(recurring_template::Column::Id)
        .all(&state.db)
        .await?;

    let data: Vec<TemplateResponse> = templates.into_iter().map(TemplateResponse::from).collect();
    Ok(Json(ApiResponse::new(
        data,
        "Recurring templates retrieved successfully",
    )))
}

/// Pause a recurring template
#[utoipa::path(
    post,
    path = "/api/v1/recurring-templates/{template_id}/pause",
    tag = "recurring",
    params(
        ("template_id" = i32, Path, description = "Template ID"),
    ),
    responses(
        (status = 200, description = "Template paused", body = ApiResponse<TemplateResponse>),
        (status = 404, description = "Template not found", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Template is not active", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn pause_template(
    Path(template_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<TemplateResponse>>, ApiError> {
    let updated = recurrence::pause(&state.db, user_id, template_id).await?;
    Ok(Json(ApiResponse::new(
        TemplateResponse::from(updated),
        "Recurring template paused",
    )))
}

/// Resume a paused recurring template
///
/// Occurrences missed while paused are not regenerated; generation
/// continues from the unchanged schedule pointer.
#[utoipa::path(
    post,
    path = "/api/v1/recurring-templates/{template_id}/resume",
    tag = "recurring",
    params(
        ("template_id" = i32, Path, description = "Template ID"),
    ),
    responses(
        (status = 200, description = "Template resumed", body = ApiResponse<TemplateResponse>),
        (status = 404, description = "Template not found", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Template is not paused", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn resume_template(
    Path(template_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<TemplateResponse>>, ApiError> {
    let updated = recurrence::resume(&state.db, user_id, template_id).await?;
    Ok(Json(ApiResponse::new(
        TemplateResponse::from(updated),
        "Recurring template resumed",
    )))
}

/// Cancel a recurring template
///
/// Irreversible. Transactions already generated are untouched.
#[utoipa::path(
    post,
    path = "/api/v1/recurring-templates/{template_id}/cancel",
    tag = "recurring",
    params(
        ("template_id" = i32, Path, description = "Template ID"),
    ),
    responses(
        (status = 200, description = "Template cancelled", body = ApiResponse<TemplateResponse>),
        (status = 404, description = "Template not found", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Template already completed or cancelled", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn cancel_template(
    Path(template_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<TemplateResponse>>, ApiError> {
    let updated = recurrence::cancel(&state.db, user_id, template_id).await?;
    Ok(Json(ApiResponse::new(
        TemplateResponse::from(updated),
        "Recurring template cancelled",
    )))
}

/// Run a due-generation pass now
///
/// Materializes transactions for every active template due up to `as_of`
/// (default today), catching up missed occurrences. Safe to call
/// repeatedly; already-generated occurrences are never duplicated.
#[utoipa::path(
    post,
    path = "/api/v1/recurring-templates/generate",
    tag = "recurring",
    params(
        ("as_of" = Option<NaiveDate>, Query, description = "Generate everything due up to this date"),
    ),
    responses(
        (status = 200, description = "Generation pass completed", body = ApiResponse<GenerationReportResponse>)
    )
)]
#[instrument(skip(state))]
pub async fn generate_due_now(
    Query(query): Query<GenerateQuery>,
    State(state): State<AppState>,
    CallerId(_user_id): CallerId,
) -> Result<Json<ApiResponse<GenerationReportResponse>>, ApiError> {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let report = recurrence::run_due_generation(&state.db, as_of).await?;

    let data = GenerationReportResponse {
        generated: report.generated,
        completed: report.completed,
        failed: report
            .failed
            .into_iter()
            .map(|(template_id, error)| FailedTemplate { template_id, error })
            .collect(),
    };
    Ok(Json(ApiResponse::new(data, "Generation pass completed")))
}
