use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, Utc};
use ledger::balance::{self, NewTransaction};
use model::entities::account::{self, AccountKind};
use model::entities::user;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::schemas::{ApiResponse, AppState, CallerId};

/// Request body for creating a new account
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateAccountRequest {
    /// Account name
    pub name: String,
    /// Institution holding the account
    pub institution: Option<String>,
    /// Account kind: checking, savings, credit, investment or cash
    pub kind: String,
    /// Starting balance, materialized as an "Opening balance" transaction
    /// so the balance always equals the sum of transactions
    pub opening_balance: Option<Decimal>,
    /// Date of the opening balance (default: today)
    pub opening_date: Option<NaiveDate>,
}

/// Request body for updating an account
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateAccountRequest {
    /// Account name
    pub name: Option<String>,
    /// Institution holding the account
    pub institution: Option<String>,
    /// Set to false to archive the account; archived accounts reject new
    /// transactions but keep their history
    pub is_active: Option<bool>,
}

/// Account response model
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    pub id: i32,
    pub name: String,
    pub institution: Option<String>,
    pub kind: String,
    pub currency_code: String,
    pub balance: Decimal,
    pub is_active: bool,
}

impl From<account::Model> for AccountResponse {
    fn from(model: account::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            institution: model.institution,
            kind: kind_name(model.kind).to_string(),
            currency_code: model.currency_code,
            balance: model.balance,
            is_active: model.is_active,
        }
    }
}

fn kind_name(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Checking => "checking",
        AccountKind::Savings => "savings",
        AccountKind::Credit => "credit",
        AccountKind::Investment => "investment",
        AccountKind::Cash => "cash",
    }
}

fn parse_kind(raw: &str) -> Result<AccountKind, ApiError> {
    match raw.to_lowercase().as_str() {
        "checking" => Ok(AccountKind::Checking),
        "savings" => Ok(AccountKind::Savings),
        "credit" => Ok(AccountKind::Credit),
        "investment" => Ok(AccountKind::Investment),
        "cash" => Ok(AccountKind::Cash),
        other => Err(ApiError::validation(format!(
            "unknown account kind '{other}'"
        ))),
    }
}

/// Create a new account
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    tag = "accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created successfully", body = ApiResponse<AccountResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 404, description = "User not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_account(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AccountResponse>>), ApiError> {
    debug!("Creating account '{}' for user {}", request.name, user_id);

    if request.name.trim().is_empty() {
        return Err(ApiError::validation("account name must not be empty"));
    }
    let kind = parse_kind(&request.kind)?;

    let owner = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id}")))?;

    // The account row and its opening-balance transaction commit together.
    let txn = state.db.begin().await?;
    let created = account::ActiveModel {
        user_id: Set(user_id),
        name: Set(request.name),
        institution: Set(request.institution),
        kind: Set(kind),
        currency_code: Set(owner.currency_code),
        balance: Set(Decimal::ZERO),
        is_active: Set(true),
        is_manual: Set(true),
        last_synced_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if let Some(opening) = request.opening_balance {
        if !opening.is_zero() {
            balance::create_transaction_in(
                &txn,
                user_id,
                NewTransaction {
                    account_id: created.id,
                    date: request.opening_date.unwrap_or_else(|| Utc::now().date_naive()),
                    amount: opening,
                    payee: "Opening balance".to_string(),
                    category_id: None,
                    notes: None,
                    tag_ids: Vec::new(),
                    is_imported: false,
                    external_id: None,
                },
            )
            .await?;
        }
    }
    txn.commit().await?;

    // Re-read for the post-opening balance.
    let fresh = account::Entity::find_by_id(created.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("account {}", created.id)))?;

    info!("Account created with ID: {}", fresh.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            AccountResponse::from(fresh),
            "Account created successfully",
        )),
    ))
}

/// Get all accounts for the calling user
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    tag = "accounts",
    responses(
        (status = 200, description = "Accounts retrieved successfully", body = ApiResponse<Vec<AccountResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_accounts(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<Vec<AccountResponse>>>, ApiError> {
    let accounts = account::Entity::find()
        .filter(account::Column::UserId.eq(user_id))
        .order_by_asc(account::Column::Id)
        .all(&state.db)
        .await?;

    let data: Vec<AccountResponse> = accounts.into_iter().map(AccountResponse::from).collect();
    Ok(Json(ApiResponse::new(
        data,
        "Accounts retrieved successfully",
    )))
}

/// Get a specific account
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{account_id}",
    tag = "accounts",
    params(
        ("account_id" = i32, Path, description = "Account ID"),
    ),
    responses(
        (status = 200, description = "Account retrieved successfully", body = ApiResponse<AccountResponse>),
        (status = 404, description = "Account not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_account(
    Path(account_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<ApiResponse<AccountResponse>>, ApiError> {
    let found = owned_account(&state, user_id, account_id).await?;
    Ok(Json(ApiResponse::new(
        AccountResponse::from(found),
        "Account retrieved successfully",
    )))
}

/// Update or archive an account
#[utoipa::path(
    put,
    path = "/api/v1/accounts/{account_id}",
    tag = "accounts",
    params(
        ("account_id" = i32, Path, description = "Account ID"),
    ),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated successfully", body = ApiResponse<AccountResponse>),
        (status = 404, description = "Account not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_account(
    Path(account_id): Path<i32>,
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<ApiResponse<AccountResponse>>, ApiError> {
    let existing = owned_account(&state, user_id, account_id).await?;

    let mut active: account::ActiveModel = existing.into();
    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(ApiError::validation("account name must not be empty"));
        }
        active.name = Set(name);
    }
    if let Some(institution) = request.institution {
        active.institution = Set(Some(institution));
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }

    let updated = active.update(&state.db).await?;
    info!("Account {} updated", updated.id);
    Ok(Json(ApiResponse::new(
        AccountResponse::from(updated),
        "Account updated successfully",
    )))
}

async fn owned_account(
    state: &AppState,
    user_id: i32,
    account_id: i32,
) -> Result<account::Model, ApiError> {
    account::Entity::find_by_id(account_id)
        .filter(account::Column::UserId.eq(user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("account {account_id}")))
}
