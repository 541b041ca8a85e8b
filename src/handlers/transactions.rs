use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use ledger::alerts::TriggeredAlert;
use ledger::balance::{self, MutationOutcome, NewTransaction, TransactionPatch};
use model::entities::transaction;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::schemas::{ApiResponse, AppState, CallerId};

/// Request body for recording a transaction
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateTransactionRequest {
    /// Account the transaction belongs to
    pub account_id: i32,
    /// Transaction date (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Signed amount: positive inflow, negative outflow; zero is rejected
    pub amount: Decimal,
    /// Payee or description
    pub payee: String,
    /// Spending category
    pub category_id: Option<i32>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Tags to attach
    #[serde(default)]
    pub tag_ids: Vec<i32>,
    /// Bank-feed identifier for import de-duplication
    pub external_id: Option<String>,
}

/// Request body for a partial transaction update.
///
/// `category_id` and `notes` distinguish "omitted" (leave alone) from
/// explicit `null` (clear the field).
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateTransactionRequest {
    /// Move the transaction to another account
    pub account_id: Option<i32>,
    /// Transaction date (YYYY-MM-DD)
    pub date: Option<NaiveDate>,
    /// Signed amount; zero is rejected
    pub amount: Option<Decimal>,
    /// Payee or description
    pub payee: Option<String>,
    /// Spending category; `null` clears it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<i32>>,
    /// Free-form notes; `null` clears them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    /// Restrict to one account
    pub account_id: Option<i32>,
    /// Earliest date to include (YYYY-MM-DD)
    pub start_date: Option<NaiveDate>,
    /// Latest date to include (YYYY-MM-DD)
    pub end_date: Option<NaiveDate>,
}

/// Transaction response model
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: i32,
    pub account_id: i32,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub payee: String,
    pub category_id: Option<i32>,
    pub notes: Option<String>,
    pub is_imported: bool,
    pub external_id: Option<String>,
}

impl From<transaction::Model> for TransactionResponse {
    fn from(model: transaction::Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            date: model.date,
            amount: model.amount,
            payee: model.payee,
            category_id: model.category_id,
            notes: model.notes,
            is_imported: model.is_imported,
            external_id: model.external_id,
        }
    }
}

/// A budget alert threshold crossed by this mutation
#[derive(Debug, Serialize, ToSchema)]
pub struct TriggeredAlertResponse {
    pub budget_id: i32,
    pub category_id: i32,
    /// First day of the budget month
    pub month: NaiveDate,
    pub threshold_percent: i32,
    pub budget_amount: Decimal,
    pub spent: Decimal,
    /// Spent as a percentage of the budget amount
    pub percentage: Decimal,
}

impl From<TriggeredAlert> for TriggeredAlertResponse {
    fn from(alert: TriggeredAlert) -> Self {
        Self {
            budget_id: alert.budget_id,
            category_id: alert.category_id,
            month: alert.month,
            threshold_percent: alert.threshold_percent,
            budget_amount: alert.budget_amount,
            spent: alert.spent,
            percentage: alert.percentage,
        }
    }
}

/// A committed transaction mutation plus any budget alerts it fired
#[derive(Debug, Serialize, ToSchema)]
pub struct MutationResponse {
    pub transaction: TransactionResponse,
    pub triggered_alerts: Vec<TriggeredAlertResponse>,
}

impl From<MutationOutcome> for MutationResponse {
    fn from(outcome: MutationOutcome) -> Self {
        Self {
            transaction: TransactionResponse::from(outcome.transaction),
            triggered_alerts: outcome
                .triggered_alerts
                .into_iter()
                .map(TriggeredAlertResponse::from)
                .collect(),
        }
    }
}

/// Record a transaction
///
/// The transaction and the owning account's balance update commit as one
/// atomic unit; any budget alert thresholds the spending crosses are
/// returned in the response.
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    tag = "transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction recorded", body = ApiResponse<MutationResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Account or category not found", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Archived account or duplicate import", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_transaction(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MutationResponse>>), ApiError> {
    debug!(
        "Recording transaction of {} on account {}",
        request.amount, request.account_id
    );

    let outcome = balance::create_transaction(
        &state.db,
        user_id,
        NewTransaction {
            account_id: request.account_id,
            date: request.date,
            amount: request.amount,
            payee: request.payee,
            category_id: request.category_id,
            notes: request.notes,
            tag_ids: request.tag_ids,
            is_imported: request.external_id.is_some(),
            external_id: request.external_id,
        },
    )
    .await?;

    info!("Transaction {} recorded", outcome.transaction.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            MutationResponse::from(outcome),
            "Transaction recorded successfully",
        )),
    ))
}

/// List transactions for the calling user
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    tag = "transactions",
    params(
        ("account_id" = Option<i32>, Query, description = "Restrict to one account"),
        ("start_date" = Option<NaiveDate>, Query, description = "Earliest date to include"),
        ("end_date" = Option<NaiveDate>, Query, description = "Latest date to include"),
    ),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = ApiResponse<Vec<TransactionResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_transactions(
    Query(query): Query<TransactionQuery>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>, ApiError> {
    let mut find = transaction::Entity::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id);
    if let Some(account_id) = query.account_id {
        find = find.filter(transaction::Column::AccountId.eq(account_id));
    }
    if let Some(start) = query.start_date {
        find = find.filter(transaction::Column::Date.gte(start));
    }
    if let Some(end) = query.end_date {
        find = find.filter(transaction::Column::Date.lte(end));
    }

    let transactions = find.all(&state.db).await?;
    debug!("Retrieved {} transactions", transactions.len());

    let data: Vec<TransactionResponse> = transactions
        .into_iter()
        .map(TransactionResponse::from)
        .collect();
    Ok(Json(ApiResponse::new(
        data,
        "Transactions retrieved successfully",
    )))
}

/// Get a specific transaction
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    params(
        ("transaction_id" = i32, Path, description = "Transaction ID"),
    ),
    responses(
        (status = 200, description = "Transaction retrieved successfully", body = ApiResponse<TransactionResponse>),
        (status = 404, description = "Transaction not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transaction(
    Path(transaction_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let found = transaction::Entity::find_by_id(transaction_id)
        .filter(transaction::Column::UserId.eq(user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("transaction {transaction_id}")))?;

    Ok(Json(ApiResponse::new(
        TransactionResponse::from(found),
        "Transaction retrieved successfully",
    )))
}

/// Edit a transaction
///
/// Amount changes adjust the account balance by the difference; moving
/// the transaction between accounts adjusts both balances.
#[utoipa::path(
    put,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    params(
        ("transaction_id" = i32, Path, description = "Transaction ID"),
    ),
    request_body = UpdateTransactionRequest,
    responses(
        (status = 200, description = "Transaction updated", body = ApiResponse<MutationResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Transaction not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_transaction(
    Path(transaction_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<UpdateTransactionRequest>,
) -> Result<Json<ApiResponse<MutationResponse>>, ApiError> {
    let outcome = balance::update_transaction(
        &state.db,
        user_id,
        transaction_id,
        TransactionPatch {
            account_id: request.account_id,
            date: request.date,
            amount: request.amount,
            payee: request.payee,
            category_id: request.category_id,
            notes: request.notes,
        },
    )
    .await?;

    info!("Transaction {} updated", transaction_id);
    Ok(Json(ApiResponse::new(
        MutationResponse::from(outcome),
        "Transaction updated successfully",
    )))
}

/// Delete a transaction
///
/// Reverses the transaction's effect on the account balance atomically.
#[utoipa::path(
    delete,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    params(
        ("transaction_id" = i32, Path, description = "Transaction ID"),
    ),
    responses(
        (status = 200, description = "Transaction deleted", body = ApiResponse<Vec<TriggeredAlertResponse>>),
        (status = 404, description = "Transaction not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_transaction(
    Path(transaction_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<Vec<TriggeredAlertResponse>>>, ApiError> {
    let alerts = balance::delete_transaction(&state.db, user_id, transaction_id).await?;

    info!("Transaction {} deleted", transaction_id);
    let data: Vec<TriggeredAlertResponse> = alerts
        .into_iter()
        .map(TriggeredAlertResponse::from)
        .collect();
    Ok(Json(ApiResponse::new(
        data,
        "Transaction deleted successfully",
    )))
}
