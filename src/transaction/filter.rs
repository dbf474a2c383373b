//! Turns query parameters into a filter over a user's transactions.
//!
//! Every parameter is optional and malformed values are treated as absent, so a
//! bad link never produces an error page.

use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};
use rust_decimal::Decimal;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    auth::UserID,
    category::CategoryName,
    database_id::{CategoryId, TransactionId},
    transaction::{Amount, TransactionType},
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// The transaction type, date range and categories to narrow a transaction list down to.
///
/// The default filter matches every transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Only show income or only show expenses.
    pub transaction_type: Option<TransactionType>,
    /// The earliest date to include.
    pub start_date: Option<Date>,
    /// The latest date to include.
    pub end_date: Option<Date>,
    /// Only show transactions in one of these categories. Empty means any category.
    pub category_ids: Vec<CategoryId>,
}

impl TransactionFilter {
    /// Build a filter from decoded query string pairs.
    ///
    /// Recognises `transaction_type`, `start_date`, `end_date` and any number of
    /// `category` pairs. Other keys, such as `page`, are ignored.
    pub fn from_query_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut filter = Self::default();

        for (key, value) in pairs {
            let value = value.trim();

            match key {
                "transaction_type" => filter.transaction_type = value.parse().ok(),
                "start_date" => filter.start_date = parse_date(value),
                "end_date" => filter.end_date = parse_date(value),
                "category" => {
                    if let Ok(category_id) = value.parse::<CategoryId>() {
                        filter.category_ids.push(category_id);
                    }
                }
                _ => {}
            }
        }

        filter.category_ids.sort_unstable();
        filter.category_ids.dedup();

        filter
    }

    /// Build a filter from a raw (still percent-encoded) query string.
    pub fn from_query_string(query: Option<&str>) -> Self {
        let pairs = parse_query_pairs(query);

        Self::from_query_pairs(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
    }

    /// Encode the filter as a query string that [TransactionFilter::from_query_string] reads back.
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if let Some(transaction_type) = self.transaction_type {
            pairs.push(("transaction_type", transaction_type.to_string()));
        }
        if let Some(start_date) = self.start_date {
            pairs.push(("start_date", start_date.to_string()));
        }
        if let Some(end_date) = self.end_date {
            pairs.push(("end_date", end_date.to_string()));
        }
        for category_id in &self.category_ids {
            pairs.push(("category", category_id.to_string()));
        }

        serde_urlencoded::to_string(pairs).unwrap_or_default()
    }

    /// Append the filter's query string to `route`.
    pub fn to_url(&self, route: &str) -> String {
        let query = self.to_query_string();

        if query.is_empty() {
            route.to_owned()
        } else {
            format!("{route}?{query}")
        }
    }

    /// Whether the filter imposes no constraints.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Build the SQL `WHERE` clause and its parameters for `user_id`'s transactions.
    ///
    /// Columns are qualified with the `"transaction"` table name so that the clause
    /// can be used in queries that join other tables.
    pub(crate) fn where_clause(&self, user_id: UserID) -> (String, Vec<SqlValue>) {
        let mut conditions = vec!["\"transaction\".user_id = ?".to_owned()];
        let mut params = vec![SqlValue::Integer(user_id.as_i64())];

        if let Some(transaction_type) = self.transaction_type {
            conditions.push("\"transaction\".type = ?".to_owned());
            params.push(SqlValue::Text(transaction_type.as_str().to_owned()));
        }
        if let Some(start_date) = self.start_date {
            conditions.push("\"transaction\".date >= ?".to_owned());
            params.push(SqlValue::Text(start_date.to_string()));
        }
        if let Some(end_date) = self.end_date {
            conditions.push("\"transaction\".date <= ?".to_owned());
            params.push(SqlValue::Text(end_date.to_string()));
        }
        if !self.category_ids.is_empty() {
            let placeholders = vec!["?"; self.category_ids.len()].join(", ");
            conditions.push(format!("\"transaction\".category_id IN ({placeholders})"));
            params.extend(self.category_ids.iter().copied().map(SqlValue::Integer));
        }

        (format!("WHERE {}", conditions.join(" AND ")), params)
    }
}

fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value, DATE_FORMAT).ok()
}

/// Decode a raw query string into key/value pairs, keeping repeated keys.
///
/// A query string that cannot be decoded is treated as empty.
pub fn parse_query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    match query {
        Some(query) => serde_urlencoded::from_str(query).unwrap_or_else(|error| {
            tracing::warn!("Ignoring malformed query string {query:?}: {error}");
            Vec::new()
        }),
        None => Vec::new(),
    }
}

/// A transaction joined with the name of its category, as shown in the transaction table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRow {
    pub id: TransactionId,
    pub transaction_type: TransactionType,
    pub amount: Amount,
    pub date: Date,
    pub category_id: CategoryId,
    pub category_name: CategoryName,
}

/// A window into a sorted list of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Zero-based number of rows to skip.
    pub offset: u64,
    /// Maximum number of rows to return.
    pub limit: u64,
}

impl Page {
    /// The page with the one-based `page_number` for `page_size` rows per page.
    pub fn new(page_number: u64, page_size: u64) -> Self {
        Self {
            offset: page_number.saturating_sub(1) * page_size,
            limit: page_size,
        }
    }
}

/// Get `user_id`'s transactions that match `filter`, newest first.
///
/// Transactions on the same date are ordered by descending ID so that the
/// order is stable. Pass `page` to only get a slice of the results.
pub fn get_transaction_rows(
    user_id: UserID,
    filter: &TransactionFilter,
    page: Option<Page>,
    connection: &Connection,
) -> Result<Vec<TransactionRow>, Error> {
    let (where_sql, mut params) = filter.where_clause(user_id);
    let limit_sql = match page {
        Some(page) => {
            params.push(SqlValue::Integer(page.limit as i64));
            params.push(SqlValue::Integer(page.offset as i64));
            "LIMIT ? OFFSET ?"
        }
        None => "",
    };

    let query = format!(
        "SELECT \"transaction\".id, \"transaction\".type, \"transaction\".amount, \
        \"transaction\".date, category.id, category.name \
        FROM \"transaction\" \
        INNER JOIN category ON \"transaction\".category_id = category.id \
        {where_sql} \
        ORDER BY \"transaction\".date DESC, \"transaction\".id DESC \
        {limit_sql}"
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(params.iter()), |row| {
            let category_name: String = row.get(5)?;

            Ok(TransactionRow {
                id: row.get(0)?,
                transaction_type: row.get(1)?,
                amount: row.get(2)?,
                date: row.get(3)?,
                category_id: row.get(4)?,
                category_name: CategoryName::new_unchecked(&category_name),
            })
        })?
        .map(|row_result| row_result.map_err(Error::SqlError))
        .collect()
}

/// Count `user_id`'s transactions that match `filter`.
pub fn count_filtered_transactions(
    user_id: UserID,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<u64, Error> {
    let (where_sql, params) = filter.where_clause(user_id);
    let query = format!("SELECT COUNT(\"transaction\".id) FROM \"transaction\" {where_sql}");

    connection
        .query_row(&query, params_from_iter(params.iter()), |row| {
            row.get::<_, usize>(0)
        })
        .map(|count| count as u64)
        .map_err(|error| error.into())
}

/// Convert a sum of cents from the database into a decimal amount of dollars.
pub(crate) fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
