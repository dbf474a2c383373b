//! Moving transactions in and out of CSV files.

mod export;
mod import;
mod record;

pub use export::export_transactions;
pub use import::{get_import_form, import_transactions};
