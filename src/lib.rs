//! Spendlog is a small web service for tracking personal expenses.
//!
//! Expenses are recorded against a user-defined category with an amount,
//! description, and the date the money was spent. The service exposes a JSON
//! API for recording expenses, browsing them as a filtered and paginated
//! list, and feeding two chart summaries: expense totals per calendar day
//! and expense counts per category.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use tokio::signal;

mod app_state;
mod category;
mod database_id;
mod db;
mod endpoints;
mod expense;
mod pagination;
mod routing;
mod summary;
mod timezone;

pub use app_state::AppState;
pub use category::{Category, CategoryName, create_category};
pub use database_id::DatabaseID;
pub use db::initialize as initialize_db;
pub use expense::{Expense, ExpenseBuilder, create_expense};
pub use pagination::PaginationConfig;
pub use routing::build_router;
pub use timezone::get_local_offset;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used to create or rename a category.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// An expense amount was negative, NaN or infinite.
    ///
    /// Expenses record money spent, so the amount must be a finite,
    /// non-negative number.
    #[error("{0} is not a valid expense amount")]
    InvalidAmount(f64),

    /// A write referenced a category ID that does not exist in the database.
    #[error("the category ID does not refer to a valid category")]
    InvalidCategory,

    /// The client asked to sort the expense listing by an unknown field.
    #[error("cannot sort expenses by unknown field \"{0}\"")]
    InvalidSortField(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),

    /// Tried to delete a category that still has expenses recorded against it.
    #[error("the category still has expenses and cannot be deleted")]
    CategoryInUse,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLock,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, _) if sql_error.extended_code == 787 => {
                Error::InvalidCategory
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// The JSON envelope used for all error responses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Error::EmptyCategoryName
            | Error::InvalidAmount(_)
            | Error::InvalidCategory
            | Error::InvalidSortField(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            Error::CategoryInUse => (StatusCode::CONFLICT, self.to_string()),
            // Internal details are logged but never sent to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_owned(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
