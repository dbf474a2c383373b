//! Defines the form fragment and endpoint for updating a transaction.
use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::Form;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::UserID,
    category::get_all_categories,
    database_id::TransactionId,
    endpoints::{self, format_endpoint},
    transaction::{
        get_transaction,
        form::{
            FormErrors, TransactionForm, invalid_form_response, success_response,
            transaction_form,
        },
        update_transaction,
    },
};

/// The state needed to edit a transaction.
#[derive(Debug, Clone)]
pub struct EditTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

const SUBMIT_LABEL: &str = "Update Transaction";

/// Renders the transaction form pre-filled with the transaction `transaction_id`.
///
/// Responds with 404 if the transaction does not exist or belongs to another user.
pub async fn get_update_transaction_form(
    State(state): State<EditTransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let transaction = match get_transaction(transaction_id, user_id, &connection) {
        Ok(transaction) => transaction,
        Err(error) => {
            tracing::warn!("user {user_id} could not get transaction {transaction_id}: {error}");
            return error.into_alert_response();
        }
    };

    let categories = match get_all_categories(&connection) {
        Ok(categories) => categories,
        Err(error) => {
            tracing::error!("could not get categories: {error}");
            return error.into_alert_response();
        }
    };

    Html(
        transaction_form(
            &TransactionForm::from_transaction(&transaction),
            &FormErrors::default(),
            &categories,
            &format_endpoint(endpoints::UPDATE_TRANSACTION, transaction_id),
            SUBMIT_LABEL,
        )
        .into_string(),
    )
    .into_response()
}

/// A route handler for updating the transaction `transaction_id`.
///
/// Only the owner of a transaction may update it, anyone else gets a 404.
pub async fn update_transaction_endpoint(
    State(state): State<EditTransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    Form(form): Form<TransactionForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    // Other users' transactions are not found, even when the form is invalid.
    if let Err(error) = get_transaction(transaction_id, user_id, &connection) {
        tracing::warn!("user {user_id} could not update transaction {transaction_id}: {error}");
        return error.into_alert_response();
    }

    let categories = match get_all_categories(&connection) {
        Ok(categories) => categories,
        Err(error) => {
            tracing::error!("could not get categories: {error}");
            return error.into_alert_response();
        }
    };

    let builder = match form.validate(&categories) {
        Ok(builder) => builder,
        Err(errors) => {
            tracing::debug!("rejected transaction form: {errors:?}");
            return invalid_form_response(transaction_form(
                &form,
                &errors,
                &categories,
                &format_endpoint(endpoints::UPDATE_TRANSACTION, transaction_id),
                SUBMIT_LABEL,
            ));
        }
    };

    match update_transaction(transaction_id, user_id, builder, &connection) {
        Ok(_) => success_response("Transaction was updated successfully!"),
        Err(error) => {
            tracing::error!("could not update transaction {transaction_id}: {error}");
            error.into_alert_response()
        }
    }
}
