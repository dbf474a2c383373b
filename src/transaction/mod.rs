//! Transactions: income and expense records owned by a user.
//!
//! This module contains:
//! - The `Transaction` model, its `Amount` and `TransactionType`, and the database queries
//! - The filter over query parameters and the totals computed from it
//! - The route handlers for the list, chart, create, update and delete views

mod aggregate;
mod charts;
mod core;
mod create;
mod delete;
mod edit;
mod filter;
mod form;
mod list;

pub use charts::get_charts_page;
pub use core::{
    Amount, Transaction, TransactionBuilder, TransactionType, count_transactions,
    create_transaction, create_transaction_table, delete_transaction, get_transaction,
    transaction_exists, update_transaction,
};
pub use create::{create_transaction_endpoint, get_create_transaction_form};
pub use delete::delete_transaction_endpoint;
pub use edit::{get_update_transaction_form, update_transaction_endpoint};
pub use filter::{TransactionFilter, TransactionRow, get_transaction_rows};
pub use form::{TRANSACTION_BLOCK_TARGET, success_response, transaction_block};
pub use list::{get_transactions_fragment, get_transactions_page};
