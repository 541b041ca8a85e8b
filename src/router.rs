use crate::handlers::{
    accounts::{create_account, get_account, get_accounts, update_account},
    budgets::{check_budget_alerts, create_budget, get_budgets, reset_budget_alerts, update_budget},
    categories::{create_category, get_categories},
    conversion::{conversion_history, conversion_status, start_conversion},
    goals::{create_goal, get_goals, update_goal},
    health::health_check,
    recurring::{
        cancel_template, create_template, generate_due_now, get_templates, pause_template,
        resume_template,
    },
    tags::{create_tag, get_tags},
    transactions::{
        create_transaction, delete_transaction, get_transaction, get_transactions,
        update_transaction,
    },
    users::{create_user, get_user, get_users},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // User routes
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users", get(get_users))
        .route("/api/v1/users/:user_id", get(get_user))
        // Account routes
        .route("/api/v1/accounts", post(create_account))
        .route("/api/v1/accounts", get(get_accounts))
        .route("/api/v1/accounts/:account_id", get(get_account))
        .route("/api/v1/accounts/:account_id", put(update_account))
        // Category and tag routes
        .route("/api/v1/categories", post(create_category))
        .route("/api/v1/categories", get(get_categories))
        .route("/api/v1/tags", post(create_tag))
        .route("/api/v1/tags", get(get_tags))
        // Transaction routes
        .route("/api/v1/transactions", post(create_transaction))
        .route("/api/v1/transactions", get(get_transactions))
        .route("/api/v1/transactions/:transaction_id", get(get_transaction))
        .route("/api/v1/transactions/:transaction_id", put(update_transaction))
        .route(
            "/api/v1/transactions/:transaction_id",
            delete(delete_transaction),
        )
        // Recurring template routes
        .route("/api/v1/recurring-templates", post(create_template))
        .route("/api/v1/recurring-templates", get(get_templates))
        .route("/api/v1/recurring-templates/generate", post(generate_due_now))
        .route(
            "/api/v1/recurring-templates/:template_id/pause",
            post(pause_template),
        )
        .route(
            "/api/v1/recurring-templates/:template_id/resume",
            post(resume_template),
        )
        .route(
            "/api/v1/recurring-templates/:template_id/cancel",
            post(cancel_template),
        )
        // Budget routes
        .route("/api/v1/budgets", post(create_budget))
        .route("/api/v1/budgets", get(get_budgets))
        .route("/api/v1/budgets/:budget_id", put(update_budget))
        .route(
            "/api/v1/budgets/:budget_id/reset-alerts",
            post(reset_budget_alerts),
        )
        .route(
            "/api/v1/budgets/:budget_id/check-alerts",
            post(check_budget_alerts),
        )
        // Goal routes
        .route("/api/v1/goals", post(create_goal))
        .route("/api/v1/goals", get(get_goals))
        .route("/api/v1/goals/:goal_id", put(update_goal))
        // Currency conversion routes
        .route("/api/v1/conversion", post(start_conversion))
        .route("/api/v1/conversion/status", get(conversion_status))
        .route("/api/v1/conversion/history", get(conversion_history))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
