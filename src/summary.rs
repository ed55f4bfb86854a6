//! The chart summary feeds: expense totals per calendar day and expense
//! counts per category.
//!
//! Both summaries are computed over the entire expense set, independent of
//! any filter or page the listing endpoint is showing.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Serialize;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::{AppState, Error};

/// The fixed palette of chart color tokens, reused cyclically.
///
/// The tokens are CSS variables resolved by the charting frontend.
const CHART_PALETTE: [&str; 5] = [
    "var(--chart-1)",
    "var(--chart-2)",
    "var(--chart-3)",
    "var(--chart-4)",
    "var(--chart-5)",
];

/// The total amount spent on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    /// The local calendar day the expenses occurred on.
    pub date: Date,
    /// The sum of the expense amounts for that day.
    pub amount: f64,
}

/// The number of expenses recorded against one category, with its chart color.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    /// The name of the category.
    pub category_name: String,
    /// The number of expenses in the category.
    ///
    /// The field is named `visitors` on the wire because that is the data key
    /// the donut chart component expects; the quantity is an expense count.
    pub visitors: u64,
    /// The color token assigned to the category's chart segment.
    pub fill: String,
}

/// Sum expense amounts per local calendar day, ordered by day ascending.
///
/// Days without expenses are omitted, so the series is sparse rather than a
/// dense calendar. `local_timezone` determines which calendar day each
/// expense falls on.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is a SQL error.
pub fn daily_expense_totals(
    local_timezone: UtcOffset,
    connection: &Connection,
) -> Result<Vec<DailyTotal>, Error> {
    let rows: Vec<(i64, f64)> = connection
        .prepare("SELECT date, amount FROM expense;")?
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;

    // Bucketing by local day happens here rather than in SQL because the
    // timezone offset is not available to SQLite.
    let mut totals: BTreeMap<Date, f64> = BTreeMap::new();
    for (timestamp, amount) in rows {
        let date = OffsetDateTime::from_unix_timestamp(timestamp)
            .map_err(|error| {
                Error::SqlError(rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Integer,
                    Box::new(error),
                ))
            })?
            .to_offset(local_timezone)
            .date();
        *totals.entry(date).or_insert(0.0) += amount;
    }

    Ok(totals
        .into_iter()
        .map(|(date, amount)| DailyTotal { date, amount })
        .collect())
}

/// Count expenses per category, in category insertion order.
///
/// Every category appears exactly once, including categories with no
/// expenses. Each entry is assigned a color token from [CHART_PALETTE] by its
/// position, so the colors are deterministic for a fixed category set.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is a SQL error.
pub fn category_expense_counts(connection: &Connection) -> Result<Vec<CategoryCount>, Error> {
    // SQLite integers come back as i64; COUNT is never negative.
    let rows: Vec<(String, i64)> = connection
        .prepare(
            "SELECT category.name, COUNT(expense.id)
             FROM category LEFT JOIN expense ON expense.category_id = category.id
             GROUP BY category.id
             ORDER BY category.id ASC;",
        )?
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(index, (category_name, count))| CategoryCount {
            category_name,
            visitors: count as u64,
            fill: CHART_PALETTE[index % CHART_PALETTE.len()].to_owned(),
        })
        .collect())
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The state needed for the summary routes.
#[derive(Debug, Clone)]
pub struct SummaryState {
    /// The local timezone as a UTC offset.
    pub local_timezone: UtcOffset,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The response body for the chart summary endpoints.
#[derive(Debug, Serialize)]
pub struct SummaryResponse<T> {
    /// The chart series.
    pub data: Vec<T>,
}

/// A route handler for the daily expense totals that feed the bar chart.
pub async fn get_bar_chart_summary_endpoint(
    State(state): State<SummaryState>,
) -> Result<Json<SummaryResponse<DailyTotal>>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    let data = daily_expense_totals(state.local_timezone, &connection)?;

    Ok(Json(SummaryResponse { data }))
}

/// A route handler for the per-category expense counts that feed the pie chart.
pub async fn get_pie_chart_summary_endpoint(
    State(state): State<SummaryState>,
) -> Result<Json<SummaryResponse<CategoryCount>>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    let data = category_expense_counts(&connection)?;

    Ok(Json(SummaryResponse { data }))
}
