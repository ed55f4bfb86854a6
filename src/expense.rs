//! Expense management for the expense tracking application.
//!
//! This module contains everything related to expenses:
//! - The `Expense` model and `ExpenseBuilder` for creating expenses
//! - The listing query that filters by calendar day, sorts, and paginates
//! - Route handlers for the expense CRUD endpoints

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::{Connection, Row, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, UtcOffset};

use crate::{
    AppState, Error,
    category::{Category, CategoryName},
    database_id::DatabaseID,
    pagination::{PaginationConfig, page_count},
};

// ============================================================================
// MODELS
// ============================================================================

/// A single recorded outlay of money.
///
/// To create a new `Expense`, use [ExpenseBuilder] with [create_expense].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// The ID of the expense.
    pub id: DatabaseID,
    /// The ID of the category the expense is recorded against.
    pub category_id: DatabaseID,
    /// The amount of money spent.
    pub amount: f64,
    /// A text description of what the expense was for.
    pub description: String,
    /// When the expense occurred.
    ///
    /// This is the moment the money was spent, not when the record was
    /// created.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// An expense joined with the category it is recorded against.
///
/// This is the shape returned by the listing and single-expense endpoints so
/// that clients do not need a second round trip to resolve category names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseWithCategory {
    /// The ID of the expense.
    pub id: DatabaseID,
    /// The ID of the category the expense is recorded against.
    pub category_id: DatabaseID,
    /// The amount of money spent.
    pub amount: f64,
    /// A text description of what the expense was for.
    pub description: String,
    /// When the expense occurred.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// The full identity of the expense's category.
    pub category: Category,
}

/// A builder for creating [Expense] instances.
///
/// The description defaults to an empty string and the date defaults to the
/// moment the builder was created, matching the behaviour of recording an
/// expense "now". Pass the builder to [create_expense] to persist it.
#[derive(Debug, PartialEq, Clone)]
pub struct ExpenseBuilder {
    /// The ID of the category to record the expense against.
    pub category_id: DatabaseID,
    /// The amount of money spent.
    pub amount: f64,
    /// A text description of what the expense was for.
    pub description: String,
    /// When the expense occurred.
    pub date: OffsetDateTime,
}

impl ExpenseBuilder {
    /// Create a builder for an expense of `amount` against `category_id`.
    pub fn new(category_id: DatabaseID, amount: f64) -> Self {
        Self {
            category_id,
            amount,
            description: String::new(),
            date: OffsetDateTime::now_utc(),
        }
    }

    /// Set the description for the expense.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Set the date the expense occurred.
    pub fn date(mut self, date: OffsetDateTime) -> Self {
        self.date = date;
        self
    }
}

/// Check that `amount` is a valid expense amount.
///
/// # Errors
/// Returns [Error::InvalidAmount] if `amount` is negative, NaN or infinite.
fn validate_amount(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(Error::InvalidAmount(amount))
    }
}

// ============================================================================
// LISTING QUERY
// ============================================================================

/// The fields that the expense listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Sort by the date the expense occurred.
    Date,
    /// Sort by the amount spent.
    Amount,
    /// Sort by the expense description.
    Description,
    /// Sort by the name of the expense's category.
    Category,
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "date" => Ok(SortField::Date),
            "amount" => Ok(SortField::Amount),
            "description" => Ok(SortField::Description),
            "category" => Ok(SortField::Category),
            other => Err(Error::InvalidSortField(other.to_string())),
        }
    }
}

/// Defines how expenses should be fetched from [query_expenses].
#[derive(Debug, Default)]
pub struct ExpenseQuery {
    /// Include only expenses that occurred on this local calendar day.
    pub day: Option<Date>,
    /// Orders expenses by this field in ascending order. `None` sorts by
    /// date, most recent first.
    pub sort_by: Option<SortField>,
    /// Selects up to the first N (`limit`) expenses. `None` selects all.
    pub limit: Option<u64>,
    /// Ignore the first N expenses. Only has an effect if `limit` is not `None`.
    pub offset: u64,
}

/// The unix timestamp bounds `[start, end)` of the calendar day `day` in the
/// timezone `local_timezone`.
fn day_bounds(day: Date, local_timezone: UtcOffset) -> (i64, i64) {
    let start = day.midnight().assume_offset(local_timezone).unix_timestamp();
    let end = match day.next_day() {
        Some(next_day) => next_day
            .midnight()
            .assume_offset(local_timezone)
            .unix_timestamp(),
        None => i64::MAX,
    };

    (start, end)
}

/// Every ordering ends with the expense ID so that rows with equal sort keys
/// keep a deterministic order and pagination is reproducible across pages.
fn order_clause(sort_by: Option<SortField>) -> &'static str {
    match sort_by {
        None => "ORDER BY expense.date DESC, expense.id ASC",
        Some(SortField::Date) => "ORDER BY expense.date ASC, expense.id ASC",
        Some(SortField::Amount) => "ORDER BY expense.amount ASC, expense.id ASC",
        Some(SortField::Description) => "ORDER BY expense.description ASC, expense.id ASC",
        Some(SortField::Category) => "ORDER BY category.name ASC, expense.id ASC",
    }
}

/// Query for expenses in the database, each joined with its category.
///
/// The result is filtered, ordered, and paginated according to `query`.
/// `local_timezone` determines which calendar day an expense falls on when
/// the day filter is set.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is a SQL error.
pub fn query_expenses(
    query: &ExpenseQuery,
    local_timezone: UtcOffset,
    connection: &Connection,
) -> Result<Vec<ExpenseWithCategory>, Error> {
    let mut query_string_parts = vec![
        "SELECT expense.id, expense.category_id, expense.amount, expense.description, \
         expense.date, category.name
         FROM expense INNER JOIN category ON expense.category_id = category.id"
            .to_string(),
    ];
    let mut query_parameters = vec![];

    if let Some(day) = query.day {
        let (start, end) = day_bounds(day, local_timezone);
        query_string_parts.push(format!(
            "WHERE expense.date >= ?{} AND expense.date < ?{}",
            query_parameters.len() + 1,
            query_parameters.len() + 2,
        ));
        query_parameters.push(Value::Integer(start));
        query_parameters.push(Value::Integer(end));
    }

    query_string_parts.push(order_clause(query.sort_by).to_string());

    if let Some(limit) = query.limit {
        // SQLite reads integer literals larger than i64::MAX as REAL, which
        // is a datatype error in a LIMIT clause.
        let limit = limit.min(i64::MAX as u64);
        let offset = query.offset.min(i64::MAX as u64);
        query_string_parts.push(format!("LIMIT {limit} OFFSET {offset}"));
    }

    let query_string = query_string_parts.join(" ");
    let params = params_from_iter(query_parameters.iter());

    connection
        .prepare(&query_string)?
        .query_map(params, map_joined_row)?
        .map(|expense_result| expense_result.map_err(Error::SqlError))
        .collect()
}

/// Get the number of expenses that match the day filter, or the total number
/// of expenses when `day` is `None`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn count_expenses(
    day: Option<Date>,
    local_timezone: UtcOffset,
    connection: &Connection,
) -> Result<u64, Error> {
    // SQLite integers come back as i64; COUNT is never negative.
    let count: i64 = match day {
        Some(day) => {
            let (start, end) = day_bounds(day, local_timezone);
            connection.query_row(
                "SELECT COUNT(id) FROM expense WHERE date >= ?1 AND date < ?2;",
                (start, end),
                |row| row.get(0),
            )?
        }
        None => connection.query_row("SELECT COUNT(id) FROM expense;", [], |row| row.get(0))?,
    };

    Ok(count as u64)
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new expense in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is negative, NaN or infinite,
/// - [Error::InvalidCategory] if the category ID does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_expense(builder: ExpenseBuilder, connection: &Connection) -> Result<Expense, Error> {
    let amount = validate_amount(builder.amount)?;

    let expense = connection
        .prepare(
            "INSERT INTO expense (category_id, amount, description, date)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, category_id, amount, description, date",
        )?
        .query_row(
            (
                builder.category_id,
                amount,
                builder.description,
                builder.date.unix_timestamp(),
            ),
            map_expense_row,
        )?;

    Ok(expense)
}

/// Retrieve an expense from the database by its `id`, joined with its category.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid expense,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_expense(
    id: DatabaseID,
    connection: &Connection,
) -> Result<ExpenseWithCategory, Error> {
    let expense = connection
        .prepare(
            "SELECT expense.id, expense.category_id, expense.amount, expense.description, \
             expense.date, category.name
             FROM expense INNER JOIN category ON expense.category_id = category.id
             WHERE expense.id = :id",
        )?
        .query_row(&[(":id", &id)], map_joined_row)?;

    Ok(expense)
}

/// The fields of an expense that can be changed after it has been recorded.
///
/// The date an expense occurred is fixed at creation time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseUpdate {
    /// The ID of the category to record the expense against.
    pub category_id: DatabaseID,
    /// The amount of money spent.
    pub amount: f64,
    /// A text description of what the expense was for.
    #[serde(default)]
    pub description: String,
}

/// Update the category, amount, and description of the expense with `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid expense,
/// - [Error::InvalidAmount] if the amount is negative, NaN or infinite,
/// - [Error::InvalidCategory] if the category ID does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_expense(
    id: DatabaseID,
    update: ExpenseUpdate,
    connection: &Connection,
) -> Result<Expense, Error> {
    let amount = validate_amount(update.amount)?;

    let expense = connection
        .prepare(
            "UPDATE expense SET category_id = ?1, amount = ?2, description = ?3
             WHERE id = ?4
             RETURNING id, category_id, amount, description, date",
        )?
        .query_row(
            (update.category_id, amount, update.description, id),
            map_expense_row,
        )?;

    Ok(expense)
}

/// Delete the expense with `id` from the database.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid expense,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_expense(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM expense WHERE id = ?1;", (id,))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Create the expense table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
                id INTEGER PRIMARY KEY,
                category_id INTEGER NOT NULL REFERENCES category (id),
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                date INTEGER NOT NULL
            );",
        (),
    )?;

    Ok(())
}

/// Convert a unix timestamp column back into a date-time.
fn datetime_from_timestamp(timestamp: i64) -> Result<OffsetDateTime, rusqlite::Error> {
    OffsetDateTime::from_unix_timestamp(timestamp).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Integer,
            Box::new(error),
        )
    })
}

/// Map a database row to an [Expense].
fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let id = row.get(0)?;
    let category_id = row.get(1)?;
    let amount = row.get(2)?;
    let description = row.get(3)?;
    let date = datetime_from_timestamp(row.get(4)?)?;

    Ok(Expense {
        id,
        category_id,
        amount,
        description,
        date,
    })
}

/// Map a joined database row to an [ExpenseWithCategory].
fn map_joined_row(row: &Row) -> Result<ExpenseWithCategory, rusqlite::Error> {
    let id = row.get(0)?;
    let category_id = row.get(1)?;
    let amount = row.get(2)?;
    let description = row.get(3)?;
    let date = datetime_from_timestamp(row.get(4)?)?;
    let category_name: String = row.get(5)?;

    Ok(ExpenseWithCategory {
        id,
        category_id,
        amount,
        description,
        date,
        category: Category {
            id: category_id,
            name: CategoryName::new_unchecked(&category_name),
        },
    })
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The state needed for the expense routes.
#[derive(Debug, Clone)]
pub struct ExpenseState {
    /// The local timezone as a UTC offset.
    pub local_timezone: UtcOffset,
    /// The config that controls how to display pages of data.
    pub pagination_config: PaginationConfig,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone,
            pagination_config: state.pagination_config.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters accepted by the expense listing endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseListParams {
    /// The field to sort by, ascending. Omitted means date, most recent first.
    pub sort_by: Option<String>,
    /// Include only expenses that occurred on this local calendar day.
    pub date: Option<Date>,
    /// The page number, starting at 1.
    pub page: Option<u64>,
    /// The number of expenses per page.
    pub limit: Option<u64>,
}

/// A page of the filtered and sorted expense listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePage {
    /// The expenses on this page, each joined with its category.
    pub data: Vec<ExpenseWithCategory>,
    /// The number of expenses matching the filter across all pages.
    pub total: u64,
    /// The page number, starting at 1.
    pub page: u64,
    /// The number of expenses per page.
    pub limit: u64,
    /// The number of pages needed to show `total` expenses. Zero when there
    /// are no matching expenses.
    pub total_pages: u64,
}

/// A route handler for the filtered, sorted, paginated expense listing.
pub async fn get_expenses_endpoint(
    State(state): State<ExpenseState>,
    Query(params): Query<ExpenseListParams>,
) -> Result<Json<ExpensePage>, Error> {
    let sort_by = params
        .sort_by
        .as_deref()
        .map(SortField::from_str)
        .transpose()?;

    let page = params
        .page
        .unwrap_or(state.pagination_config.default_page)
        .max(1);
    let limit = params
        .limit
        .unwrap_or(state.pagination_config.default_page_size)
        .max(1);

    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;

    let total = count_expenses(params.date, state.local_timezone, &connection)?;
    let data = query_expenses(
        &ExpenseQuery {
            day: params.date,
            sort_by,
            limit: Some(limit),
            // Both factors are client-supplied, so the offset must not
            // overflow. A page past the end returns an empty page.
            offset: (page - 1).saturating_mul(limit),
        },
        state.local_timezone,
        &connection,
    )?;

    Ok(Json(ExpensePage {
        data,
        total,
        page,
        limit,
        total_pages: page_count(total, limit),
    }))
}

/// The request body for creating an expense.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseData {
    /// The ID of the category to record the expense against.
    pub category_id: DatabaseID,
    /// The amount of money spent.
    pub amount: f64,
    /// A text description of what the expense was for.
    #[serde(default)]
    pub description: String,
    /// When the expense occurred. Defaults to the time of the request.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

/// The response body for creating an expense.
#[derive(Debug, Serialize)]
pub struct ExpenseCreatedResponse {
    /// The newly recorded expense.
    pub expense: Expense,
}

/// The response body for fetching a single expense.
#[derive(Debug, Serialize)]
pub struct ExpenseDataResponse {
    /// The requested expense, joined with its category.
    pub data: ExpenseWithCategory,
}

/// The response body for updating an expense.
#[derive(Debug, Serialize)]
pub struct ExpenseUpdatedResponse {
    /// The expense with its new field values.
    #[serde(rename = "updatedData")]
    pub updated_data: Expense,
}

/// The response body for deleting an expense.
#[derive(Debug, Serialize)]
pub struct ExpenseDeletedResponse {
    /// A human readable confirmation.
    pub message: String,
}

/// A route handler for recording a new expense.
pub async fn create_expense_endpoint(
    State(state): State<ExpenseState>,
    Json(data): Json<CreateExpenseData>,
) -> Result<(StatusCode, Json<ExpenseCreatedResponse>), Error> {
    let mut builder =
        ExpenseBuilder::new(data.category_id, data.amount).description(&data.description);

    if let Some(date) = data.date {
        builder = builder.date(date);
    }

    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    let expense = create_expense(builder, &connection)?;

    Ok((
        StatusCode::CREATED,
        Json(ExpenseCreatedResponse { expense }),
    ))
}

/// A route handler for getting an expense by its database ID.
///
/// This function will return the status code 404 if the requested resource
/// does not exist (e.g., not created yet).
pub async fn get_expense_endpoint(
    State(state): State<ExpenseState>,
    Path(expense_id): Path<DatabaseID>,
) -> Result<Json<ExpenseDataResponse>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    let data = get_expense(expense_id, &connection)?;

    Ok(Json(ExpenseDataResponse { data }))
}

/// A route handler for updating the mutable fields of an expense.
pub async fn update_expense_endpoint(
    State(state): State<ExpenseState>,
    Path(expense_id): Path<DatabaseID>,
    Json(update): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseUpdatedResponse>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    let updated_data = update_expense(expense_id, update, &connection)?;

    Ok(Json(ExpenseUpdatedResponse { updated_data }))
}

/// A route handler for deleting an expense.
pub async fn delete_expense_endpoint(
    State(state): State<ExpenseState>,
    Path(expense_id): Path<DatabaseID>,
) -> Result<Json<ExpenseDeletedResponse>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    delete_expense(expense_id, &connection)?;

    Ok(Json(ExpenseDeletedResponse {
        message: "Expense deleted successfully".to_owned(),
    }))
}



#[cfg(test)]
mod expense_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json,
        extract::{Query, State},
        http::StatusCode,
    };
    use rusqlite::Connection;
    use time::{UtcOffset, macros::datetime};

    use crate::{
        Error,
        category::{CategoryName, create_category},
        db::initialize,
        expense::{
            CreateExpenseData, ExpenseBuilder, ExpenseListParams, create_expense,
            create_expense_endpoint, get_expenses_endpoint,
        },
    };

    use super::ExpenseState;

    fn get_expense_state() -> ExpenseState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");

        ExpenseState {
            local_timezone: UtcOffset::UTC,
            pagination_config: Default::default(),
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }

    #[tokio::test]
    async fn listing_reports_pagination_metadata() {
        let state = get_expense_state();
        {
            let connection = state.db_connection.lock().unwrap();
            let category_id = create_category(CategoryName::new_unchecked("Foo"), &connection)
                .unwrap()
                .id;
            for _ in 0..23 {
                create_expense(
                    ExpenseBuilder::new(category_id, 1.0).date(datetime!(2024-01-05 12:00 UTC)),
                    &connection,
                )
                .unwrap();
            }
        }

        let Json(page) = get_expenses_endpoint(
            State(state),
            Query(ExpenseListParams {
                page: Some(3),
                limit: Some(10),
                ..Default::default()
            }),
        )
        .await
        .expect("Could not list expenses");

        assert_eq!(page.data.len(), 3);
        assert_eq!(page.total, 23);
        assert_eq!(page.page, 3);
        assert_eq!(page.limit, 10);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn empty_listing_has_zero_pages() {
        let state = get_expense_state();

        let Json(page) = get_expenses_endpoint(State(state), Query(Default::default()))
            .await
            .expect("Could not list expenses");

        assert!(page.data.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn listing_tolerates_huge_page_numbers() {
        let state = get_expense_state();
        {
            let connection = state.db_connection.lock().unwrap();
            let category_id = create_category(CategoryName::new_unchecked("Foo"), &connection)
                .unwrap()
                .id;
            create_expense(ExpenseBuilder::new(category_id, 1.0), &connection).unwrap();
        }

        let Json(page) = get_expenses_endpoint(
            State(state),
            Query(ExpenseListParams {
                page: Some(u64::MAX),
                limit: Some(10),
                ..Default::default()
            }),
        )
        .await
        .expect("Could not list expenses");

        assert!(page.data.is_empty());
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn listing_rejects_unknown_sort_field() {
        let state = get_expense_state();

        let result = get_expenses_endpoint(
            State(state),
            Query(ExpenseListParams {
                sort_by: Some("colour".to_string()),
                ..Default::default()
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::InvalidSortField(_))));
    }

    #[tokio::test]
    async fn create_expense_defaults_date_to_now() {
        let state = get_expense_state();
        let category_id = {
            let connection = state.db_connection.lock().unwrap();
            create_category(CategoryName::new_unchecked("Foo"), &connection)
                .unwrap()
                .id
        };
        let before = time::OffsetDateTime::now_utc() - time::Duration::seconds(1);

        let (status, Json(response)) = create_expense_endpoint(
            State(state),
            Json(CreateExpenseData {
                category_id,
                amount: 12.5,
                description: "lunch".to_string(),
                date: None,
            }),
        )
        .await
        .expect("Could not create expense");

        let after = time::OffsetDateTime::now_utc() + time::Duration::seconds(1);
        assert_eq!(status, StatusCode::CREATED);
        assert!(response.expense.date >= before && response.expense.date <= after);
        assert_eq!(response.expense.amount, 12.5);
    }
}
