//! Categories group transactions, e.g. "Food" or "Salary".
//!
//! Categories are managed from the command line. The web app only lists them.

mod db;
mod domain;

pub use db::{
    count_transactions_per_category, create_category, create_category_table, delete_category,
    delete_category_with_transactions, get_all_categories, get_category, get_category_by_name,
    get_or_create_category, reassign_and_delete_category,
};
pub use domain::{Category, CategoryName, MAX_CATEGORY_NAME_LENGTH};
