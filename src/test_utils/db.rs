use rusqlite::Connection;
use time::macros::date;

use crate::{
    auth::{NewUser, PasswordHash, User, UserID, Username, create_user},
    category::{Category, CategoryName, create_category},
    database_id::CategoryId,
    db::initialize,
    transaction::{Transaction, create_transaction},
};

pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open in-memory database");
    initialize(&connection).expect("Could not initialize database");
    connection
}

#[track_caller]
pub(crate) fn create_test_user(username: &str, connection: &Connection) -> User {
    create_user(
        NewUser {
            username: Username::new_unchecked(username),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: PasswordHash::new_unchecked("hunter2"),
        },
        connection,
    )
    .expect("Could not create test user")
}

#[track_caller]
pub(crate) fn create_test_category(name: &str, connection: &Connection) -> Category {
    create_category(CategoryName::new_unchecked(name), connection)
        .expect("Could not create test category")
}

/// Create an expense dated 2025-10-05.
#[track_caller]
pub(crate) fn create_test_transaction(
    user_id: UserID,
    category_id: CategoryId,
    amount: &str,
    connection: &Connection,
) -> Transaction {
    let amount = amount.parse().expect("Invalid test amount");

    create_transaction(
        Transaction::build(amount, date!(2025 - 10 - 05), category_id),
        user_id,
        connection,
    )
    .expect("Could not create test transaction")
}
