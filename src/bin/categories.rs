use std::error::Error;
use std::process::exit;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use finance_tracker::{
    Category, CategoryName, Error as AppError, count_transactions_per_category, create_category,
    delete_category, delete_category_with_transactions, get_category_by_name, initialize_db,
    reassign_and_delete_category,
};

/// A utility for managing the categories that transactions are grouped by.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every category with the number of transactions that use it.
    List,
    /// Add a new category.
    Add {
        /// The name of the new category.
        name: String,
    },
    /// Delete a category.
    ///
    /// Without any options, a category that transactions still use is not deleted.
    Delete {
        /// The name of the category to delete.
        name: String,

        /// Move the category's transactions to this category first.
        #[arg(long, conflicts_with = "with_transactions")]
        reassign_to: Option<String>,

        /// Delete the category's transactions too.
        #[arg(long)]
        with_transactions: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let connection = Connection::open(&args.db_path)?;
    initialize_db(&connection)?;

    match args.command {
        Command::List => {
            for (category, transaction_count) in count_transactions_per_category(&connection)? {
                println!(
                    "{:>4}  {}  ({transaction_count} transactions)",
                    category.id, category.name
                );
            }
        }
        Command::Add { name } => {
            let category = create_category(CategoryName::new(&name)?, &connection)?;
            println!("Created category '{}' with ID {}", category.name, category.id);
        }
        Command::Delete {
            name,
            reassign_to,
            with_transactions,
        } => {
            let category = find_category(&name, &connection);

            if let Some(target_name) = reassign_to {
                let target = find_category(&target_name, &connection);
                let moved = reassign_and_delete_category(category.id, target.id, &connection)?;
                println!("Moved {moved} transactions to '{target_name}' and deleted '{name}'");
            } else if with_transactions {
                let deleted = delete_category_with_transactions(category.id, &connection)?;
                println!("Deleted '{name}' and {deleted} transactions");
            } else {
                match delete_category(category.id, &connection) {
                    Ok(()) => println!("Deleted '{name}'"),
                    Err(AppError::CategoryInUse(count)) => {
                        eprintln!(
                            "'{name}' is used by {count} transactions. \
                            Use --reassign-to <CATEGORY> or --with-transactions."
                        );
                        exit(1);
                    }
                    Err(error) => return Err(error.into()),
                }
            }
        }
    }

    Ok(())
}

fn find_category(name: &str, connection: &Connection) -> Category {
    match get_category_by_name(name, connection) {
        Ok(category) => category,
        Err(AppError::NotFound) => {
            eprintln!("There is no category named '{name}'");
            exit(1);
        }
        Err(error) => {
            eprintln!("Could not load the category '{name}': {error}");
            exit(1);
        }
    }
}
