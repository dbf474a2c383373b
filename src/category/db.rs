//! Database operations for categories.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    category::{Category, CategoryName},
    database_id::CategoryId,
};

/// Create a category and return it with its generated ID.
///
/// # Errors
/// Returns an [Error::DuplicateCategoryName] if a category with the same name exists.
pub fn create_category(name: CategoryName, connection: &Connection) -> Result<Category, Error> {
    connection.execute("INSERT INTO category (name) VALUES (?1);", (name.as_ref(),))?;

    let id = connection.last_insert_rowid();

    Ok(Category { id, name })
}

/// Retrieve a single category by ID.
pub fn get_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name FROM category WHERE id = :id;")?
        .query_row(&[(":id", &category_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve a single category by its exact name.
///
/// # Errors
/// Returns an [Error::NotFound] if no category has the name `name`.
pub fn get_category_by_name(name: &str, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name FROM category WHERE name = :name;")?
        .query_row(&[(":name", &name.trim())], map_row)
        .map_err(|error| error.into())
}

/// Get the category called `name`, creating it first if it does not exist.
pub fn get_or_create_category(
    name: CategoryName,
    connection: &Connection,
) -> Result<Category, Error> {
    match get_category_by_name(name.as_ref(), connection) {
        Ok(category) => Ok(category),
        Err(Error::NotFound) => create_category(name, connection),
        Err(error) => Err(error),
    }
}

/// Retrieve all categories ordered by ID.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name FROM category ORDER BY id ASC;")?
        .query_map([], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Retrieve every category with the number of transactions (across all users) that use it.
pub fn count_transactions_per_category(
    connection: &Connection,
) -> Result<Vec<(Category, u64)>, Error> {
    connection
        .prepare(
            "SELECT category.id, category.name, COUNT(\"transaction\".id)
            FROM category
            LEFT JOIN \"transaction\" ON \"transaction\".category_id = category.id
            GROUP BY category.id
            ORDER BY category.id ASC;",
        )?
        .query_map([], |row| {
            let transaction_count: usize = row.get(2)?;
            Ok((map_row(row)?, transaction_count as u64))
        })?
        .map(|maybe_count| maybe_count.map_err(|error| error.into()))
        .collect()
}

fn count_transactions_in_category(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<u64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE category_id = ?1;",
            [category_id],
            |row| row.get::<_, usize>(0),
        )
        .map(|count| count as u64)
        .map_err(|error| error.into())
}

/// Delete a category that no transaction refers to.
///
/// # Errors
/// Returns an [Error::CategoryInUse] with the number of referring transactions if the
/// category is still used, or an [Error::NotFound] if the category does not exist.
pub fn delete_category(category_id: CategoryId, connection: &Connection) -> Result<(), Error> {
    let transaction_count = count_transactions_in_category(category_id, connection)?;

    if transaction_count > 0 {
        return Err(Error::CategoryInUse(transaction_count));
    }

    let rows_affected = connection.execute("DELETE FROM category WHERE id = ?1", [category_id])?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Move the transactions of one category to another category, then delete the first category.
///
/// Returns the number of transactions that were moved.
///
/// # Errors
/// Returns an [Error::NotFound] if `category_id` does not exist and an
/// [Error::InvalidCategory] if `target_id` does not exist or is the category being deleted.
/// Nothing is changed when an error is returned.
pub fn reassign_and_delete_category(
    category_id: CategoryId,
    target_id: CategoryId,
    connection: &Connection,
) -> Result<u64, Error> {
    if category_id == target_id {
        return Err(Error::InvalidCategory(target_id));
    }

    let sql_transaction = connection.unchecked_transaction()?;

    get_category(category_id, &sql_transaction)?;
    get_category(target_id, &sql_transaction).map_err(|error| match error {
        Error::NotFound => Error::InvalidCategory(target_id),
        error => error,
    })?;

    let moved = sql_transaction.execute(
        "UPDATE \"transaction\" SET category_id = ?1 WHERE category_id = ?2",
        [target_id, category_id],
    )?;
    sql_transaction.execute("DELETE FROM category WHERE id = ?1", [category_id])?;

    sql_transaction.commit()?;

    Ok(moved as u64)
}

/// Delete a category together with every transaction that uses it.
///
/// Returns the number of transactions that were deleted.
///
/// # Errors
/// Returns an [Error::NotFound] if the category does not exist.
pub fn delete_category_with_transactions(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<u64, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    get_category(category_id, &sql_transaction)?;

    let deleted = sql_transaction.execute(
        "DELETE FROM \"transaction\" WHERE category_id = ?1",
        [category_id],
    )?;
    sql_transaction.execute("DELETE FROM category WHERE id = ?1", [category_id])?;

    sql_transaction.commit()?;

    Ok(deleted as u64)
}

/// Initialize the category table.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let name = CategoryName::new_unchecked(&raw_name);

    Ok(Category { id, name })
}
