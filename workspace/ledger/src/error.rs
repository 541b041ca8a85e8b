use thiserror::Error;

/// Error types for the ledger engine
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed input: zero amount, unknown currency code, bad month key.
    /// Rejected before anything is persisted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity missing, or not owned by the calling user.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation conflicts with existing state: a conversion already in
    /// progress, a terminal template transition, a duplicate import.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The historical-rate source is unreachable or returned garbage.
    /// Only raised during conversion; the whole run aborts untouched.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// The balance invariant would be violated. Fatal for the operation,
    /// never silently corrected.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Type alias for Result with LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;
