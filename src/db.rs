//! Database initialization for the application.

use rusqlite::Connection;

use crate::{category::create_category_table, expense::create_expense_table};

/// Create the tables for the application's domain models.
///
/// The expense table holds a foreign key into the category table, so foreign
/// key enforcement is switched on for the connection here as well.
///
/// # Errors
/// Returns an error if the tables cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    create_category_table(connection)?;
    create_expense_table(connection)?;

    Ok(())
}
