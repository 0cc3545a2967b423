// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use thiserror::Error;

/// Typed error taxonomy for the depot engine. Every core function returns
/// `Result<T, CoreError>`; the CLI layer wraps these in `anyhow` for display.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A role check failed on a privileged operation. Never downgraded to
    /// `NotFound` — denied access is an observable failure.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Entity absent, or not owned by a non-privileged caller (the two are
    /// indistinguishable from outside).
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A sell would take the position quantity below zero.
    #[error("insufficient position: sell of {requested} exceeds {held} held")]
    InsufficientPosition { requested: Decimal, held: Decimal },

    /// A buy or cash adjustment would take cash below zero without an
    /// override-kind transaction.
    #[error("insufficient cash: delta {delta} against balance {available}")]
    InsufficientCash { delta: Decimal, available: Decimal },

    /// The depot's active savings plans exceed its monthly budget.
    #[error("monthly budget exceeded by {overrun}")]
    BudgetExceeded { overrun: Decimal },

    /// The price collaborator has no quote for the asset.
    #[error("no price available for '{0}'")]
    PriceUnavailable(String),

    /// A concurrent writer held the store; the caller should retry.
    #[error("concurrent mutation, retry: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Db(rusqlite::Error),
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode::{DatabaseBusy, DatabaseLocked};
        match &e {
            rusqlite::Error::SqliteFailure(f, _) if matches!(f.code, DatabaseBusy | DatabaseLocked) => {
                CoreError::Conflict(e.to_string())
            }
            _ => CoreError::Db(e),
        }
    }
}
