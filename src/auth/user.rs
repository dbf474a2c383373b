//! Users, their table and the queries for creating and finding them.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The maximum number of characters in a username.
pub const MAX_USERNAME_LENGTH: usize = 150;

/// A username of 1 to 150 letters, digits and the characters `@.+-_`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    /// Validate and create a username. Surrounding whitespace is removed.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidUsername] if the username is empty, too long or
    /// contains a character that is not allowed.
    pub fn new(raw_username: &str) -> Result<Self, Error> {
        let username = raw_username.trim();

        if username.is_empty() {
            return Err(Error::InvalidUsername(
                "Username cannot be empty".to_owned(),
            ));
        }

        if username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(Error::InvalidUsername(format!(
                "Username cannot be longer than {MAX_USERNAME_LENGTH} characters"
            )));
        }

        let is_allowed = |c: char| c.is_alphanumeric() || "@.+-_".contains(c);
        if !username.chars().all(is_allowed) {
            return Err(Error::InvalidUsername(
                "Username may only contain letters, numbers and @/./+/-/_ characters".to_owned(),
            ));
        }

        Ok(Self(username.to_owned()))
    }

    /// Create a username without validation, e.g. for values read from the database.
    pub fn new_unchecked(username: &str) -> Self {
        Self(username.to_owned())
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The unique name the user logs in with.
    pub username: Username,
    pub first_name: String,
    pub last_name: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// The data needed to create a user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: Username,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: PasswordHash,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            password TEXT NOT NULL
        );",
    )
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_username: String = row.get(1)?;
    let raw_password_hash: String = row.get(4)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        username: Username::new_unchecked(&raw_username),
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns an [Error::DuplicateUsername] if the username is taken, or an
/// [Error::SqlError] if another SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "INSERT INTO user (username, first_name, last_name, password)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, username, first_name, last_name, password",
        )?
        .query_row(
            (
                new_user.username.as_ref(),
                &new_user.first_name,
                &new_user.last_name,
                new_user.password_hash.as_ref(),
            ),
            map_user_row,
        )
        .map_err(Error::from)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if `user_id` does not belong to a registered
/// user, or an [Error::SqlError] if the query failed.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, username, first_name, last_name, password FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(Error::from)
}

/// Get the user with the given username.
///
/// # Errors
///
/// Returns an [Error::NotFound] if no user has the username, or an
/// [Error::SqlError] if the query failed.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, username, first_name, last_name, password FROM user
            WHERE username = :username",
        )?
        .query_row(&[(":username", &username.trim())], map_user_row)
        .map_err(Error::from)
}

/// Replace the password hash of the user `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the user does not exist.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}


#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        auth::{
            NewUser, PasswordHash, UserID, Username, create_user, get_user_by_id,
            get_user_by_username, update_password,
        },
    };

    use super::create_user_table;

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: Username::new_unchecked(username),
            first_name: "Bug".to_owned(),
            last_name: "Bytes".to_owned(),
            password_hash: PasswordHash::new_unchecked("hunter2"),
        }
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();

        let inserted_user = create_user(new_user("bugbytes"), &db_connection).unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.username.as_ref(), "bugbytes");
        assert_eq!(inserted_user.first_name, "Bug");
        assert_eq!(
            inserted_user.password_hash,
            PasswordHash::new_unchecked("hunter2")
        );
    }

    #[test]
    fn insert_duplicate_username_fails() {
        let db_connection = get_db_connection();
        create_user(new_user("bugbytes"), &db_connection).unwrap();

        let result = create_user(new_user("bugbytes"), &db_connection);

        assert_eq!(result, Err(Error::DuplicateUsername));
    }

    #[test]
    fn get_user_by_id_and_username() {
        let db_connection = get_db_connection();
        let inserted_user = create_user(new_user("bugbytes"), &db_connection).unwrap();

        let by_id = get_user_by_id(inserted_user.id, &db_connection).unwrap();
        let by_username = get_user_by_username("bugbytes", &db_connection).unwrap();

        assert_eq!(by_id, inserted_user);
        assert_eq!(by_username, inserted_user);
    }

    #[test]
    fn get_missing_user_fails() {
        let db_connection = get_db_connection();

        assert_eq!(
            get_user_by_id(UserID::new(42), &db_connection),
            Err(Error::NotFound)
        );
        assert_eq!(
            get_user_by_username("nobody", &db_connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn update_password_replaces_hash() {
        let db_connection = get_db_connection();
        let user = create_user(new_user("bugbytes"), &db_connection).unwrap();
        let new_hash = PasswordHash::new_unchecked("correcthorse");

        update_password(user.id, &new_hash, &db_connection).unwrap();

        let got = get_user_by_id(user.id, &db_connection).unwrap();
        assert_eq!(got.password_hash, new_hash);
    }

    #[test]
    fn update_password_for_missing_user_fails() {
        let db_connection = get_db_connection();

        let result = update_password(
            UserID::new(7),
            &PasswordHash::new_unchecked("correcthorse"),
            &db_connection,
        );

        assert_eq!(result, Err(Error::NotFound));
    }
}
