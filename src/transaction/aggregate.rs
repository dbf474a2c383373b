//! Totals over a filtered set of transactions.
//!
//! Sums are computed by SQLite over integer cents and only converted to
//! decimals at the end, so they are exact.

use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};
use rust_decimal::Decimal;

use crate::{
    Error,
    auth::UserID,
    category::CategoryName,
    database_id::CategoryId,
    transaction::{
        TransactionType,
        filter::{TransactionFilter, cents_to_decimal},
    },
};

/// Total income and expenses of a set of transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub income: Decimal,
    pub expenses: Decimal,
}

impl Totals {
    /// Income minus expenses.
    pub fn net_income(&self) -> Decimal {
        self.income - self.expenses
    }
}

/// Sum `user_id`'s income and expenses over the transactions that match `filter`.
///
/// Either total is zero when there are no transactions of that type.
pub fn get_totals(
    user_id: UserID,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Totals, Error> {
    let (where_sql, params) = filter.where_clause(user_id);
    let query = format!(
        "SELECT
            COALESCE(SUM(CASE WHEN type = 'income' THEN amount ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN type = 'expense' THEN amount ELSE 0 END), 0)
        FROM \"transaction\" {where_sql}"
    );

    let (income_cents, expense_cents): (i64, i64) = connection
        .query_row(&query, params_from_iter(params.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;

    Ok(Totals {
        income: cents_to_decimal(income_cents),
        expenses: cents_to_decimal(expense_cents),
    })
}

/// The total amount of a category, i.e. one slice of a pie chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category_id: CategoryId,
    pub category_name: CategoryName,
    pub total: Decimal,
}

/// Sum the amounts of `transaction_type` transactions per category for the transactions that match `filter`.
///
/// Categories without matching transactions are left out. The result is ordered by category ID.
pub fn get_category_totals(
    user_id: UserID,
    filter: &TransactionFilter,
    transaction_type: TransactionType,
    connection: &Connection,
) -> Result<Vec<CategoryTotal>, Error> {
    let (where_sql, mut params) = filter.where_clause(user_id);
    params.push(SqlValue::Text(transaction_type.as_str().to_owned()));

    let query = format!(
        "SELECT category.id, category.name, SUM(\"transaction\".amount)
        FROM \"transaction\"
        INNER JOIN category ON \"transaction\".category_id = category.id
        {where_sql} AND \"transaction\".type = ?
        GROUP BY category.id
        ORDER BY category.id ASC"
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(params.iter()), |row| {
            let category_name: String = row.get(1)?;

            Ok(CategoryTotal {
                category_id: row.get(0)?,
                category_name: CategoryName::new_unchecked(&category_name),
                total: cents_to_decimal(row.get(2)?),
            })
        })?
        .map(|total| total.map_err(Error::SqlError))
        .collect()
}
