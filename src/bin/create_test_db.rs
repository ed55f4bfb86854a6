use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use spendlog::{CategoryName, ExpenseBuilder, create_category, create_expense, initialize_db};

/// A utility for creating a test database for the REST API server of spendlog.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// How many days of expenses to generate.
    #[arg(long, default_value_t = 60)]
    days: i64,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let connection = Connection::open(output_path)?;

    initialize_db(&connection)?;

    println!("Creating test categories and expenses...");

    let category_names = [
        "Groceries",
        "Transport",
        "Eating Out",
        "Utilities",
        "Entertainment",
    ];
    let mut categories = Vec::new();
    for name in category_names {
        categories.push(create_category(CategoryName::new(name)?, &connection)?);
    }

    let now = OffsetDateTime::now_utc();
    let mut expense_count = 0;

    for day in 0..args.days {
        let date = now - Duration::days(day);

        // A couple of expenses per day, spread over the categories with
        // amounts that vary enough to make the charts interesting.
        for slot in 0..2 {
            let index = ((day + slot * 3) % categories.len() as i64) as usize;
            let category = &categories[index];
            let amount = 4.5 + ((day * 7 + slot * 13) % 40) as f64;

            create_expense(
                ExpenseBuilder::new(category.id, amount)
                    .description(&format!("Test expense for {}", category.name))
                    .date(date - Duration::hours(slot * 9)),
                &connection,
            )?;
            expense_count += 1;
        }
    }

    println!(
        "Success! Created {} categories and {expense_count} expenses.",
        categories.len()
    );

    Ok(())
}
