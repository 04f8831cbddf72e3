//! Crate-wide error type composing each subsystem's own error enum.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::execution::ExecutionError;
use crate::transaction::error::TransactionError;

/// Top-level crate error.
#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DbError>;
