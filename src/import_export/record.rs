//! The CSV representation of a transaction.
//!
//! Both directions use the header `amount,type,date,category`, with the
//! category given by name.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    auth::UserID,
    category::get_category_by_name,
    transaction::{
        Amount, Transaction, TransactionBuilder, TransactionRow, TransactionType,
        create_transaction, transaction_exists,
    },
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// One line of a transactions CSV file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub amount: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub date: String,
    pub category: String,
}

impl From<&TransactionRow> for TransactionRecord {
    fn from(row: &TransactionRow) -> Self {
        Self {
            amount: row.amount.to_string(),
            transaction_type: row.transaction_type.to_string(),
            date: row.date.to_string(),
            category: row.category_name.to_string(),
        }
    }
}

/// Write `rows` as CSV text with a header line.
///
/// # Errors
/// Returns an [Error::InvalidCSV] if a record could not be serialized.
pub fn write_csv(rows: &[TransactionRow]) -> Result<String, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    // The header is only written with the first record, so write it explicitly
    // for an empty export.
    if rows.is_empty() {
        writer
            .write_record(["amount", "type", "date", "category"])
            .map_err(|error| Error::InvalidCSV(error.to_string()))?;
    }

    for row in rows {
        writer
            .serialize(TransactionRecord::from(row))
            .map_err(|error| Error::InvalidCSV(error.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::InvalidCSV(error.to_string()))?;

    String::from_utf8(bytes).map_err(|error| Error::InvalidCSV(error.to_string()))
}

/// Read every record of a transactions CSV file.
///
/// # Errors
/// Returns an [Error::InvalidCSV] if the header is missing a column or a line
/// cannot be read.
pub fn read_csv(text: &str) -> Result<Vec<TransactionRecord>, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|error| Error::InvalidCSV(error.to_string()))?
        .clone();
    for column in ["amount", "type", "date", "category"] {
        if !headers.iter().any(|header| header == column) {
            return Err(Error::InvalidCSV(format!("missing the column \"{column}\"")));
        }
    }

    reader
        .deserialize()
        .map(|record| record.map_err(|error| Error::InvalidCSV(error.to_string())))
        .collect()
}

/// A problem with one line of an imported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// The line number in the file, counting the header as line 1.
    pub line: usize,
    pub message: String,
}

/// The outcome of a successful dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    /// The number of data lines in the file.
    pub row_count: usize,
    /// The transactions to insert, in file order, without duplicates.
    pub new_transactions: Vec<TransactionBuilder>,
}

impl ImportPlan {
    /// The number of lines that matched an existing transaction or an earlier line.
    pub fn skipped_count(&self) -> usize {
        self.row_count - self.new_transactions.len()
    }
}

/// Check every record and work out which ones `user_id` does not have yet,
/// without writing anything.
///
/// A record is a duplicate when `user_id` already has a transaction with the
/// same amount, type, date and category, or an earlier record has them.
///
/// # Errors
/// Returns the error of every invalid record. Errors from the database abort
/// the dry run immediately.
pub fn dry_run(
    records: &[TransactionRecord],
    user_id: UserID,
    connection: &Connection,
) -> Result<Result<ImportPlan, Vec<RowError>>, Error> {
    let mut row_errors = Vec::new();
    let mut seen = HashSet::new();
    let mut new_transactions = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let builder = match resolve_record(record, connection)? {
            Ok(builder) => builder,
            Err(message) => {
                row_errors.push(RowError {
                    line: index + 2,
                    message,
                });
                continue;
            }
        };

        if !seen.insert(builder.clone()) || transaction_exists(&builder, user_id, connection)? {
            continue;
        }

        new_transactions.push(builder);
    }

    if !row_errors.is_empty() {
        return Ok(Err(row_errors));
    }

    Ok(Ok(ImportPlan {
        row_count: records.len(),
        new_transactions,
    }))
}

/// Insert the transactions of `plan` for `user_id` in one SQLite transaction.
///
/// # Errors
/// Returns an [Error::SqlError] if any insert fails, in which case nothing is stored.
pub fn commit(
    plan: ImportPlan,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let transactions = plan
        .new_transactions
        .into_iter()
        .map(|builder| create_transaction(builder, user_id, &sql_transaction))
        .collect::<Result<Vec<_>, _>>()?;

    sql_transaction.commit()?;

    Ok(transactions)
}

/// Turn `record` into a transaction, or describe what is wrong with it.
fn resolve_record(
    record: &TransactionRecord,
    connection: &Connection,
) -> Result<Result<TransactionBuilder, String>, Error> {
    let amount = match record.amount.parse::<Amount>() {
        Ok(amount) => amount,
        Err(error) => return Ok(Err(error.to_string())),
    };

    let transaction_type = match record.transaction_type.parse::<TransactionType>() {
        Ok(transaction_type) => transaction_type,
        Err(error) => return Ok(Err(error.to_string())),
    };

    let date = match Date::parse(record.date.trim(), DATE_FORMAT) {
        Ok(date) => date,
        Err(_) => return Ok(Err(format!("\"{}\" is not a valid date", record.date))),
    };

    let category = match get_category_by_name(&record.category, connection) {
        Ok(category) => category,
        Err(Error::NotFound) => {
            return Ok(Err(Error::UnknownCategory(record.category.clone()).to_string()));
        }
        Err(error) => return Err(error),
    };

    Ok(Ok(Transaction::build(amount, date, category.id).transaction_type(transaction_type)))
}

#[cfg(test)]
mod csv_tests {
    use time::macros::date;

    use crate::{
        category::CategoryName,
        transaction::{TransactionRow, TransactionType},
    };

    use super::{TransactionRecord, read_csv, write_csv};

    fn row(amount: &str, transaction_type: TransactionType, category: &str) -> TransactionRow {
        TransactionRow {
            id: 1,
            transaction_type,
            amount: amount.parse().unwrap(),
            date: date!(2025 - 10 - 05),
            category_id: 1,
            category_name: CategoryName::new_unchecked(category),
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let rows = [
            row("12.5", TransactionType::Expense, "Food"),
            row("1000", TransactionType::Income, "Salary"),
        ];

        let got = write_csv(&rows).unwrap();

        assert_eq!(
            got,
            "amount,type,date,category\n\
            12.50,expense,2025-10-05,Food\n\
            1000.00,income,2025-10-05,Salary\n"
        );
    }

    #[test]
    fn empty_export_still_has_header() {
        assert_eq!(write_csv(&[]).unwrap(), "amount,type,date,category\n");
    }

    #[test]
    fn quotes_category_names_with_commas() {
        let got = write_csv(&[row("1", TransactionType::Expense, "Food, drinks")]).unwrap();

        assert!(got.ends_with("1.00,expense,2025-10-05,\"Food, drinks\"\n"));
    }

    #[test]
    fn reads_columns_in_any_order() {
        let got = read_csv("date,category,type,amount\n2025-10-05,Food,expense,12.50\n").unwrap();

        assert_eq!(
            got,
            [TransactionRecord {
                amount: "12.50".to_owned(),
                transaction_type: "expense".to_owned(),
                date: "2025-10-05".to_owned(),
                category: "Food".to_owned(),
            }]
        );
    }

    #[test]
    fn rejects_missing_column() {
        assert!(read_csv("amount,type,date\n1,expense,2025-10-05\n").is_err());
    }

    #[test]
    fn rejects_empty_file() {
        assert!(read_csv("").is_err());
    }
}

#[cfg(test)]
mod dry_run_tests {
    use time::macros::date;

    use crate::{
        test_utils::{create_test_category, create_test_transaction, create_test_user, get_test_connection},
        transaction::count_transactions,
    };

    use super::{TransactionRecord, commit, dry_run};

    fn record(amount: &str, transaction_type: &str, date: &str, category: &str) -> TransactionRecord {
        TransactionRecord {
            amount: amount.to_owned(),
            transaction_type: transaction_type.to_owned(),
            date: date.to_owned(),
            category: category.to_owned(),
        }
    }

    #[test]
    fn valid_records_are_planned_and_committed() {
        let connection = get_test_connection();
        let user = create_test_user("alice", &connection);
        create_test_category("Food", &connection);
        create_test_category("Salary", &connection);
        let records = [
            record("12.50", "expense", "2025-10-05", "Food"),
            record("1000", "income", "2025-10-01", "Salary"),
        ];

        let plan = dry_run(&records, user.id, &connection).unwrap().unwrap();

        assert_eq!(plan.row_count, 2);
        assert_eq!(plan.new_transactions.len(), 2);
        assert_eq!(plan.new_transactions[1].date, date!(2025 - 10 - 01));
        assert_eq!(count_transactions(user.id, &connection).unwrap(), 0);

        let inserted = commit(plan, user.id, &connection).unwrap();

        assert_eq!(inserted.len(), 2);
        assert_eq!(count_transactions(user.id, &connection).unwrap(), 2);
    }

    #[test]
    fn skips_existing_and_repeated_records() {
        let connection = get_test_connection();
        let user = create_test_user("alice", &connection);
        let food = create_test_category("Food", &connection);
        create_test_transaction(user.id, food.id, "12.50", &connection);
        let records = [
            record("12.50", "expense", "2025-10-05", "Food"),
            record("3", "expense", "2025-10-06", "Food"),
            record("3.00", "expense", "2025-10-06", "Food"),
        ];

        let plan = dry_run(&records, user.id, &connection).unwrap().unwrap();

        assert_eq!(plan.row_count, 3);
        assert_eq!(plan.new_transactions.len(), 1);
        assert_eq!(plan.skipped_count(), 2);
    }

    #[test]
    fn other_users_transactions_are_not_duplicates() {
        let connection = get_test_connection();
        let alice = create_test_user("alice", &connection);
        let bob = create_test_user("bob", &connection);
        let food = create_test_category("Food", &connection);
        create_test_transaction(bob.id, food.id, "12.50", &connection);

        let plan = dry_run(
            &[record("12.50", "expense", "2025-10-05", "Food")],
            alice.id,
            &connection,
        )
        .unwrap()
        .unwrap();

        assert_eq!(plan.new_transactions.len(), 1);
    }

    #[test]
    fn reports_every_invalid_line() {
        let connection = get_test_connection();
        let user = create_test_user("alice", &connection);
        create_test_category("Food", &connection);
        let records = [
            record("12.50", "expense", "2025-10-05", "Food"),
            record("-5", "expense", "2025-10-05", "Food"),
            record("5", "gift", "2025-10-05", "Food"),
            record("5", "expense", "05/10/2025", "Food"),
            record("5", "expense", "2025-10-05", "Rent"),
        ];

        let errors = dry_run(&records, user.id, &connection).unwrap().unwrap_err();

        let lines: Vec<_> = errors.iter().map(|error| error.line).collect();
        assert_eq!(lines, [3, 4, 5, 6]);
        assert_eq!(errors[3].message, "there is no category named \"Rent\"");
    }
}
