use std::fmt;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use ledger::rates::RateProvider;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::error::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Historical exchange-rate source used by currency conversion
    pub rates: Arc<dyn RateProvider>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("db", &self.db)
            .field("rates", &"<dyn RateProvider>")
            .finish()
    }
}

/// Identity of the calling user, taken from the `X-User-Id` header. Every
/// data route is scoped to this user.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .ok_or_else(|| ApiError::validation("missing X-User-Id header"))?;
        let id = raw
            .to_str()
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .ok_or_else(|| ApiError::validation("X-User-Id header must be an integer"))?;
        Ok(CallerId(id))
    }
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::users::create_user,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::accounts::create_account,
        crate::handlers::accounts::get_accounts,
        crate::handlers::accounts::get_account,
        crate::handlers::accounts::update_account,
        crate::handlers::categories::create_category,
        crate::handlers::categories::get_categories,
        crate::handlers::tags::create_tag,
        crate::handlers::tags::get_tags,
        crate::handlers::transactions::create_transaction,
        crate::handlers::transactions::get_transactions,
        crate::handlers::transactions::get_transaction,
        crate::handlers::transactions::update_transaction,
        crate::handlers::transactions::delete_transaction,
        crate::handlers::recurring::create_template,
        crate::handlers::recurring::get_templates,
        crate::handlers::recurring::pause_template,
        crate::handlers::recurring::resume_template,
        crate::handlers::recurring::cancel_template,
        crate::handlers::recurring::generate_due_now,
        crate::handlers::budgets::create_budget,
        crate::handlers::budgets::get_budgets,
        crate::handlers::budgets::update_budget,
        crate::handlers::budgets::reset_budget_alerts,
        crate::handlers::budgets::check_budget_alerts,
        crate::handlers::goals::create_goal,
        crate::handlers::goals::get_goals,
        crate::handlers::goals::update_goal,
        crate::handlers::conversion::start_conversion,
        crate::handlers::conversion::conversion_status,
        crate::handlers::conversion::conversion_history,
    ),
    components(
        schemas(
            ApiResponse<crate::handlers::users::UserResponse>,
            ApiResponse<crate::handlers::accounts::AccountResponse>,
            ApiResponse<crate::handlers::transactions::MutationResponse>,
            ApiResponse<crate::handlers::recurring::TemplateResponse>,
            ApiResponse<crate::handlers::recurring::GenerationReportResponse>,
            ApiResponse<crate::handlers::budgets::BudgetResponse>,
            ApiResponse<crate::handlers::goals::GoalResponse>,
            ApiResponse<crate::handlers::conversion::ConversionSummaryResponse>,
            ApiResponse<crate::handlers::conversion::ConversionStatusResponse>,
            ErrorResponse,
            HealthResponse,
            crate::handlers::users::CreateUserRequest,
            crate::handlers::users::UserResponse,
            crate::handlers::accounts::CreateAccountRequest,
            crate::handlers::accounts::UpdateAccountRequest,
            crate::handlers::accounts::AccountResponse,
            crate::handlers::categories::CreateCategoryRequest,
            crate::handlers::categories::CategoryResponse,
            crate::handlers::tags::CreateTagRequest,
            crate::handlers::tags::TagResponse,
            crate::handlers::transactions::CreateTransactionRequest,
            crate::handlers::transactions::UpdateTransactionRequest,
            crate::handlers::transactions::TransactionResponse,
            crate::handlers::transactions::TriggeredAlertResponse,
            crate::handlers::transactions::MutationResponse,
            crate::handlers::recurring::CreateTemplateRequest,
            crate::handlers::recurring::TemplateResponse,
            crate::handlers::recurring::GenerationReportResponse,
            crate::handlers::recurring::FailedTemplate,
            crate::handlers::budgets::CreateBudgetRequest,
            crate::handlers::budgets::UpdateBudgetRequest,
            crate::handlers::budgets::BudgetResponse,
            crate::handlers::budgets::ThresholdResponse,
            crate::handlers::goals::CreateGoalRequest,
            crate::handlers::goals::UpdateGoalRequest,
            crate::handlers::goals::GoalResponse,
            crate::handlers::conversion::ConvertRequest,
            crate::handlers::conversion::ConversionSummaryResponse,
            crate::handlers::conversion::ConversionStatusResponse,
            crate::handlers::conversion::ConversionRunResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User management endpoints"),
        (name = "accounts", description = "Account management endpoints"),
        (name = "categories", description = "Spending category endpoints"),
        (name = "tags", description = "Tag endpoints"),
        (name = "transactions", description = "Ledger transaction endpoints"),
        (name = "recurring", description = "Recurring template endpoints"),
        (name = "budgets", description = "Budget and alert endpoints"),
        (name = "goals", description = "Savings goal endpoints"),
        (name = "conversion", description = "Currency conversion endpoints"),
    ),
    info(
        title = "Moneta API",
        description = "Personal finance ledger with balance integrity, recurring transactions, budget alerts and whole-dataset currency conversion",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
