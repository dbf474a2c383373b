use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rand::{Rng, seq::SliceRandom};
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use finance_tracker::{
    Amount, CategoryName, Error as AppError, NewUser, PasswordHash, Transaction, TransactionType,
    Username, ValidatedPassword, create_transaction, create_user, get_or_create_category,
    get_user_by_username, initialize_db,
};

const CATEGORY_NAMES: [&str; 9] = [
    "Bills", "Food", "Clothes", "Medical", "Housing", "Salary", "Social", "Transport", "Vacation",
];

const TEST_USERNAME: &str = "bugbytes";
const TEST_PASSWORD: &str = "test";

/// A utility for creating a database with sample data for manual testing.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// The number of random transactions to create for the test user.
    #[arg(long, short, default_value_t = 20)]
    count: u32,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }

    println!("Opening database at {output_path:#?}");
    let connection = Connection::open(output_path)?;

    initialize_db(&connection)?;

    println!("Creating categories...");
    let categories = CATEGORY_NAMES
        .iter()
        .map(|name| get_or_create_category(CategoryName::new(name)?, &connection))
        .collect::<Result<Vec<_>, _>>()?;

    let user = match get_user_by_username(TEST_USERNAME, &connection) {
        Ok(user) => {
            println!("Using existing user {TEST_USERNAME}");
            user
        }
        Err(AppError::NotFound) => {
            println!("Creating user {TEST_USERNAME} with the password '{TEST_PASSWORD}'...");
            create_user(
                NewUser {
                    username: Username::new(TEST_USERNAME)?,
                    first_name: "Bug".to_owned(),
                    last_name: "Bytes".to_owned(),
                    password_hash: PasswordHash::new(
                        ValidatedPassword::new_unchecked(TEST_PASSWORD),
                        PasswordHash::DEFAULT_COST,
                    )?,
                },
                &connection,
            )?
        }
        Err(error) => return Err(error.into()),
    };

    println!("Creating {} random transactions...", args.count);
    let mut rng = rand::thread_rng();
    let today = OffsetDateTime::now_utc().date();

    for _ in 0..args.count {
        let Some(category) = categories.choose(&mut rng) else {
            break;
        };
        let transaction_type = if category.name.as_ref() == "Salary" {
            TransactionType::Income
        } else {
            TransactionType::Expense
        };
        let amount = Amount::from_cents(rng.gen_range(100..=250_000))?;
        let date = today - Duration::days(rng.gen_range(0..365));

        create_transaction(
            Transaction::build(amount, date, category.id).transaction_type(transaction_type),
            user.id,
            &connection,
        )?;
    }

    println!("Success!");

    Ok(())
}
