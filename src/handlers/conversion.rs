use axum::{extract::State, response::Json};
use chrono::{NaiveDateTime, Utc};
use ledger::conversion::{self, ConversionStatus, ConversionSummary};
use model::entities::conversion_run::{self, RunStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::schemas::{ApiResponse, AppState, CallerId};

/// Request body for starting a currency conversion
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ConvertRequest {
    /// ISO 4217 code to re-denominate the whole dataset into
    pub to_currency: String,
}

/// Summary of a completed conversion
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversionSummaryResponse {
    pub run_id: i32,
    pub from_currency: String,
    pub to_currency: String,
    /// Current-date rate applied to budgets and goals
    pub rate: Decimal,
    pub transactions_converted: usize,
    pub accounts_converted: usize,
    pub budgets_converted: usize,
    pub goals_converted: usize,
    pub duration_ms: i64,
}

impl From<ConversionSummary> for ConversionSummaryResponse {
    fn from(s: ConversionSummary) -> Self {
        Self {
            run_id: s.run_id,
            from_currency: s.from_currency,
            to_currency: s.to_currency,
            rate: s.rate,
            transactions_converted: s.transactions_converted,
            accounts_converted: s.accounts_converted,
            budgets_converted: s.budgets_converted,
            goals_converted: s.goals_converted,
            duration_ms: s.duration_ms,
        }
    }
}

/// Polling view of the conversion state
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversionStatusResponse {
    /// "in_progress" or "idle"
    pub state: String,
    pub from_currency: Option<String>,
    pub to_currency: Option<String>,
    pub started_at: Option<NaiveDateTime>,
}

/// One past conversion run, including failures
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversionRunResponse {
    pub id: i32,
    pub from_currency: String,
    pub to_currency: String,
    pub status: String,
    pub transactions_converted: i32,
    pub accounts_converted: i32,
    pub budgets_converted: i32,
    pub goals_converted: i32,
    pub rate: Option<Decimal>,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}

impl From<conversion_run::Model> for ConversionRunResponse {
    fn from(model: conversion_run::Model) -> Self {
        let status = match model.status {
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        Self {
            id: model.id,
            from_currency: model.from_currency,
            to_currency: model.to_currency,
            status: status.to_string(),
            transactions_converted: model.transactions_converted,
            accounts_converted: model.accounts_converted,
            budgets_converted: model.budgets_converted,
            goals_converted: model.goals_converted,
            rate: model.rate,
            started_at: model.started_at,
            completed_at: model.completed_at,
            error_message: model.error_message,
        }
    }
}

/// Convert the entire dataset to another currency
///
/// Rewrites every transaction at its date's historical rate, recomputes
/// account balances, converts budgets and goals at today's rate and
/// switches the user's currency, all or nothing. At most one conversion
/// per user runs at a time.
#[utoipa::path(
    post,
    path = "/api/v1/conversion",
    tag = "conversion",
    request_body = ConvertRequest,
    responses(
        (status = 200, description = "Conversion completed", body = ApiResponse<ConversionSummaryResponse>),
        (status = 400, description = "Unknown or identical currency", body = crate::schemas::ErrorResponse),
        (status = 409, description = "A conversion is already in progress", body = crate::schemas::ErrorResponse),
        (status = 502, description = "Rate source unavailable; nothing was modified", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn start_conversion(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<ConvertRequest>,
) -> Result<Json<ApiResponse<ConversionSummaryResponse>>, ApiError> {
    let today = Utc::now().date_naive();
    let summary = conversion::convert(
        &state.db,
        state.rates.as_ref(),
        user_id,
        &request.to_currency,
        today,
    )
    .await?;

    info!(
        "Conversion run {} completed: {} -> {}",
        summary.run_id, summary.from_currency, summary.to_currency
    );
    Ok(Json(ApiResponse::new(
        ConversionSummaryResponse::from(summary),
        "Conversion completed successfully",
    )))
}

/// Get the current conversion state
#[utoipa::path(
    get,
    path = "/api/v1/conversion/status",
    tag = "conversion",
    responses(
        (status = 200, description = "Conversion state", body = ApiResponse<ConversionStatusResponse>)
    )
)]
#[instrument(skip(state))]
pub async fn conversion_status(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<ConversionStatusResponse>>, ApiError> {
    let data = match conversion::get_status(&state.db, user_id).await? {
        ConversionStatus::InProgress {
            from_currency,
            to_currency,
            started_at,
        } => ConversionStatusResponse {
            state: "in_progress".to_string(),
            from_currency: Some(from_currency),
            to_currency: Some(to_currency),
            started_at: Some(started_at),
        },
        ConversionStatus::Idle => ConversionStatusResponse {
            state: "idle".to_string(),
            from_currency: None,
            to_currency: None,
            started_at: None,
        },
    };
    Ok(Json(ApiResponse::new(data, "Conversion state retrieved")))
}

/// Get the last conversion runs, most recent first
#[utoipa::path(
    get,
    path = "/api/v1/conversion/history",
    tag = "conversion",
    responses(
        (status = 200, description = "Conversion history", body = ApiResponse<Vec<ConversionRunResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn conversion_history(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<Vec<ConversionRunResponse>>>, ApiError> {
    let runs = conversion::get_history(&state.db, user_id).await?;
    let data: Vec<ConversionRunResponse> =
        runs.into_iter().map(ConversionRunResponse::from).collect();
    Ok(Json(ApiResponse::new(
        data,
        "Conversion history retrieved",
    )))
}
