//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    auth::UserID,
    database_id::{CategoryId, TransactionId},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    /// The lowercase name used in forms, query strings, CSV files and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    /// Case-insensitive, surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.eq_ignore_ascii_case("income") {
            Ok(TransactionType::Income)
        } else if trimmed.eq_ignore_ascii_case("expense") {
            Ok(TransactionType::Expense)
        } else {
            Err(Error::InvalidTransactionType(trimmed.to_owned()))
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// The largest amount in cents, i.e. 10 significant digits with 2 decimal places.
const MAX_AMOUNT_CENTS: i64 = 9_999_999_999;

/// A strictly positive amount of money with at most two decimal places.
///
/// Amounts are stored in the database as integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    /// Validate and create an amount.
    ///
    /// # Errors
    /// Returns an [Error::NonPositiveAmount] if `amount` is zero or negative, or an
    /// [Error::InvalidAmount] if it has more than two decimal places or ten digits.
    pub fn new(amount: Decimal) -> Result<Self, Error> {
        if amount <= Decimal::ZERO {
            return Err(Error::NonPositiveAmount);
        }

        if amount.normalize().scale() > 2 {
            return Err(Error::InvalidAmount(
                "Amount can have at most 2 decimal places".to_owned(),
            ));
        }

        let max_amount = Decimal::new(MAX_AMOUNT_CENTS, 2);
        if amount > max_amount {
            return Err(Error::InvalidAmount(format!(
                "Amount cannot be more than {max_amount}"
            )));
        }

        let mut amount = amount;
        amount.rescale(2);

        Ok(Self(amount))
    }

    /// Create an amount from a whole number of cents.
    ///
    /// # Errors
    /// Returns the same errors as [Amount::new].
    pub fn from_cents(cents: i64) -> Result<Self, Error> {
        Self::new(Decimal::new(cents, 2))
    }

    /// The amount as a decimal number.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// The amount as a whole number of cents.
    pub fn cents(&self) -> i64 {
        // Bounded by MAX_AMOUNT_CENTS, so this always fits.
        (self.0 * Decimal::ONE_HUNDRED).to_i64().unwrap_or(i64::MAX)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let amount = Decimal::from_str(trimmed)
            .map_err(|_| Error::InvalidAmount(format!("\"{trimmed}\" is not a valid number")))?;

        Amount::new(amount)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.cents()))
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Amount::from_cents(value.as_i64()?)
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// The ID of the category the transaction belongs to.
    pub category_id: CategoryId,
    /// Whether the money was earned or spent.
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned in this transaction.
    pub amount: Amount,
    /// When the transaction happened.
    pub date: Date,
}

impl Transaction {
    /// Create a new expense transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(amount: Amount, date: Date, category_id: CategoryId) -> TransactionBuilder {
        TransactionBuilder {
            transaction_type: TransactionType::Expense,
            amount,
            date,
            category_id,
        }
    }
}

/// The user-supplied fields of a [Transaction].
///
/// The owner is not part of the builder: it is passed separately when the
/// transaction is stored so that it always comes from the session.
///
/// # Examples
///
/// ```ignore
/// use time::macros::date;
///
/// let builder = Transaction::build("45.99".parse()?, date!(2025 - 01 - 15), food.id)
///     .transaction_type(TransactionType::Expense);
/// let transaction = create_transaction(builder, user.id, &connection)?;
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct TransactionBuilder {
    /// Whether the money was earned or spent. Defaults to an expense.
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned.
    pub amount: Amount,
    /// The date when the transaction occurred.
    pub date: Date,
    /// The category of the transaction, e.g. "Food", "Transport", "Salary".
    pub category_id: CategoryId,
}

impl TransactionBuilder {
    /// Set the transaction type.
    pub fn transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

fn map_foreign_key_error(error: rusqlite::Error, category_id: CategoryId) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            },
            _,
        ) => Error::InvalidCategory(category_id),
        error => error.into(),
    }
}

/// Create a new transaction owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if the category ID does not refer to a real category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, category_id, type, amount, date)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, user_id, category_id, type, amount, date",
        )?
        .query_row(
            (
                user_id.as_i64(),
                builder.category_id,
                builder.transaction_type,
                builder.amount,
                builder.date,
            ),
            map_transaction_row,
        )
        .map_err(|error| map_foreign_key_error(error, builder.category_id))
}

/// Retrieve the transaction `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, user_id, category_id, type, amount, date FROM \"transaction\"
             WHERE id = :id AND user_id = :user_id",
        )?
        .query_one(
            &[(":id", &id), (":user_id", &user_id.as_i64())],
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Replace the fields of the transaction `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a transaction owned by `user_id`,
/// - [Error::InvalidCategory] if the category ID does not refer to a real category,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "UPDATE \"transaction\" SET category_id = ?1, type = ?2, amount = ?3, date = ?4
             WHERE id = ?5 AND user_id = ?6
             RETURNING id, user_id, category_id, type, amount, date",
        )?
        .query_row(
            (
                builder.category_id,
                builder.transaction_type,
                builder.amount,
                builder.date,
                id,
                user_id.as_i64(),
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingTransaction,
            error => map_foreign_key_error(error, builder.category_id),
        })
}

/// Delete the transaction `id` owned by `user_id` and return it.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTransaction] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2
             RETURNING id, user_id, category_id, type, amount, date",
        )?
        .query_row((id, user_id.as_i64()), map_transaction_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::DeleteMissingTransaction,
            error => error.into(),
        })
}

/// Get the number of transactions owned by `user_id`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(user_id: UserID, connection: &Connection) -> Result<u64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?1;",
            [user_id.as_i64()],
            |row| row.get::<_, usize>(0),
        )
        .map(|count| count as u64)
        .map_err(|error| error.into())
}

/// Whether `user_id` already has a transaction with the same amount, type, date and category.
pub fn transaction_exists(
    builder: &TransactionBuilder,
    user_id: UserID,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(
                SELECT 1 FROM \"transaction\"
                WHERE user_id = ?1 AND amount = ?2 AND type = ?3 AND date = ?4 AND category_id = ?5
            );",
            (
                user_id.as_i64(),
                builder.amount,
                builder.transaction_type,
                builder.date,
                builder.category_id,
            ),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
            amount INTEGER NOT NULL CHECK (amount > 0),
            date TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
    )
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        category_id: row.get(2)?,
        transaction_type: row.get(3)?,
        amount: row.get(4)?,
        date: row.get(5)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod amount_tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use crate::{Error, transaction::Amount};

    #[test]
    fn parses_positive_amounts() {
        let amount: Amount = "12.5".parse().unwrap();

        assert_eq!(amount.to_string(), "12.50");
        assert_eq!(amount.cents(), 1250);
    }

    #[test]
    fn rejects_zero_and_negative_amounts() {
        assert_eq!("0".parse::<Amount>(), Err(Error::NonPositiveAmount));
        assert_eq!("-44".parse::<Amount>(), Err(Error::NonPositiveAmount));
    }

    #[test]
    fn rejects_more_than_two_decimal_places() {
        assert!(matches!(
            "1.005".parse::<Amount>(),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn accepts_trailing_zeros_past_two_decimal_places() {
        assert_eq!("1.500".parse::<Amount>().unwrap().cents(), 150);
    }

    #[test]
    fn rejects_amounts_with_more_than_ten_digits() {
        assert!("99999999.99".parse::<Amount>().is_ok());
        assert!(matches!(
            "100000000.00".parse::<Amount>(),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn rejects_text() {
        assert!(matches!(
            "twelve".parse::<Amount>(),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn cents_round_trip() {
        let amount = Amount::new(Decimal::from_str("1234.56").unwrap()).unwrap();

        assert_eq!(Amount::from_cents(amount.cents()), Ok(amount));
    }
}
