//! This file defines the `Category` type and the API routes for managing categories.
//! A category is a user-defined label that groups expenses, e.g., 'Groceries'.

use std::fmt::Display;
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, database_id::DatabaseID};

/// The name of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an error if `name` is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because
    /// if the non-empty invariant is violated it will cause incorrect
    /// behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A label that groups expenses, e.g., 'Groceries', 'Eating Out', 'Transport'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Category {
    /// The id of the category.
    pub id: DatabaseID,

    /// The name of the category.
    pub name: CategoryName,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The state needed for the category routes.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating or renaming a category.
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryData {
    /// The name for the category.
    pub name: String,
}

/// The response body for listing categories or fetching a single category.
#[derive(Debug, Serialize)]
pub struct CategoryDataResponse<T> {
    /// The requested category or categories.
    pub data: T,
}

/// The response body for creating a category.
#[derive(Debug, Serialize)]
pub struct CategoryCreatedResponse {
    /// The newly created category.
    pub category: Category,
}

/// The response body for renaming a category.
#[derive(Debug, Serialize)]
pub struct CategoryUpdatedResponse {
    /// The category with its new name.
    #[serde(rename = "updatedData")]
    pub updated_data: Category,
}

/// The response body for deleting a category.
#[derive(Debug, Serialize)]
pub struct CategoryDeletedResponse {
    /// A human readable confirmation.
    pub message: String,
}

/// A route handler for listing all categories.
pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
) -> Result<Json<CategoryDataResponse<Vec<Category>>>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    let data = get_all_categories(&connection)?;

    Ok(Json(CategoryDataResponse { data }))
}

/// A route handler for creating a new category.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Json(new_category): Json<CategoryData>,
) -> Result<(StatusCode, Json<CategoryCreatedResponse>), Error> {
    let name = CategoryName::new(&new_category.name)?;

    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    let category = create_category(name, &connection)?;

    Ok((
        StatusCode::CREATED,
        Json(CategoryCreatedResponse { category }),
    ))
}

/// A route handler for getting a category by its database ID.
///
/// This function will return the status code 404 if the requested resource
/// does not exist (e.g., not created yet).
pub async fn get_category_endpoint(
    State(state): State<CategoryState>,
    Path(category_id): Path<DatabaseID>,
) -> Result<Json<CategoryDataResponse<Category>>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    let data = get_category(category_id, &connection)?;

    Ok(Json(CategoryDataResponse { data }))
}

/// A route handler for renaming a category.
pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    Path(category_id): Path<DatabaseID>,
    Json(new_data): Json<CategoryData>,
) -> Result<Json<CategoryUpdatedResponse>, Error> {
    let name = CategoryName::new(&new_data.name)?;

    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    let updated_data = rename_category(category_id, name, &connection)?;

    Ok(Json(CategoryUpdatedResponse { updated_data }))
}

/// A route handler for deleting a category.
///
/// Categories that still have expenses recorded against them cannot be
/// deleted; the handler responds with the status code 409 in that case.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    Path(category_id): Path<DatabaseID>,
) -> Result<Json<CategoryDeletedResponse>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLock)?;
    delete_category(category_id, &connection)?;

    Ok(Json(CategoryDeletedResponse {
        message: "Category deleted successfully".to_owned(),
    }))
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a category in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_category(name: CategoryName, connection: &Connection) -> Result<Category, Error> {
    connection.execute("INSERT INTO category (name) VALUES (?1);", (name.as_ref(),))?;

    let id = connection.last_insert_rowid();

    Ok(Category { id, name })
}

/// Retrieve the category with `category_id` from the database.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `category_id` does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_category(category_id: DatabaseID, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name FROM category WHERE id = :id;")?
        .query_row(&[(":id", &category_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve all categories in the database, in insertion order.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name FROM category ORDER BY id ASC;")?
        .query_map([], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Rename the category with `category_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `category_id` does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn rename_category(
    category_id: DatabaseID,
    name: CategoryName,
    connection: &Connection,
) -> Result<Category, Error> {
    let rows_affected = connection.execute(
        "UPDATE category SET name = ?1 WHERE id = ?2;",
        (name.as_ref(), category_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(Category {
        id: category_id,
        name,
    })
}

/// Delete the category with `category_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `category_id` does not refer to a valid category,
/// - [Error::CategoryInUse] if expenses still reference the category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_category(category_id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection
        .execute("DELETE FROM category WHERE id = ?1;", (category_id,))
        .map_err(|error| match Error::from(error) {
            // The foreign key constraint fails when expenses still reference
            // this category.
            Error::InvalidCategory => Error::CategoryInUse,
            other => other,
        })?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Create the category table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );",
        (),
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let name = CategoryName::new_unchecked(&raw_name);

    Ok(Category { id, name })
}
