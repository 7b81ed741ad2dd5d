use common::OrderId;
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An update targeted an order that was never inserted.
    #[error("Order has no id; insert it before updating")]
    MissingId,

    /// An update targeted an order that does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The database aborted the transaction because of a concurrent writer.
    #[error("Serialization conflict: {0}")]
    Conflict(String),

    /// The commit did not go through; nothing was written.
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// A stored row could not be mapped back to an order.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An address column could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Maps a driver error, recognising serialization failures and deadlocks.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
        {
            return StoreError::Conflict(db_err.message().to_string());
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
