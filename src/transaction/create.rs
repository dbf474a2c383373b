//! Defines the form fragment and endpoint for creating a new transaction.
use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{Html, IntoResponse, Response},
};
// Must use axum_extra's Form since it reports a missing field as an empty
// string through `serde(default)` instead of rejecting the whole request.
use axum_extra::extract::Form;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::UserID,
    category::get_all_categories,
    endpoints,
    timezone::local_today,
    transaction::{
        create_transaction,
        form::{
            FormErrors, TransactionForm, invalid_form_response, success_response,
            transaction_form,
        },
    },
};

/// The state needed to get or create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

const SUBMIT_LABEL: &str = "Add Transaction";

/// Renders an empty transaction form dated today.
pub async fn get_create_transaction_form(State(state): State<CreateTransactionState>) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let categories = match get_all_categories(&connection) {
        Ok(categories) => categories,
        Err(error) => {
            tracing::error!("could not get categories: {error}");
            return error.into_alert_response();
        }
    };

    let form = TransactionForm::new(local_today(&state.local_timezone));

    Html(
        transaction_form(
            &form,
            &FormErrors::default(),
            &categories,
            endpoints::CREATE_TRANSACTION,
            SUBMIT_LABEL,
        )
        .into_string(),
    )
    .into_response()
}

/// A route handler for creating a new transaction owned by the logged in user.
///
/// Responds with a success message, or the form with an error message next to
/// each invalid field.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserID>,
    Form(form): Form<TransactionForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

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
                endpoints::CREATE_TRANSACTION,
                SUBMIT_LABEL,
            ));
        }
    };

    match create_transaction(builder, user_id, &connection) {
        Ok(transaction) => {
            tracing::info!("user {user_id} created transaction {}", transaction.id);
            success_response("Transaction was added successfully!")
        }
        Err(error) => {
            tracing::error!("could not create transaction: {error}");
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, extract::State};
    use axum_extra::extract::Form;
    use axum_htmx::{HX_RETARGET, HX_TRIGGER};
    use scraper::Selector;

    use crate::{
        auth::UserID,
        endpoints,
        test_utils::{
            assert_field_error, assert_form_input_with_value, assert_hx_endpoint,
            assert_status_ok, assert_valid_html, create_test_category, create_test_user,
            get_header, get_test_connection, must_get_form, parse_html_fragment,
        },
        transaction::{count_transactions, form::TransactionForm, get_transaction},
    };

    use super::{CreateTransactionState, create_transaction_endpoint, get_create_transaction_form};

    fn get_test_state() -> (CreateTransactionState, UserID, i64) {
        let connection = get_test_connection();
        let user = create_test_user("alice", &connection);
        let category = create_test_category("Food", &connection);

        let state = CreateTransactionState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        (state, user.id, category.id)
    }

    /// Deserialize the form the way the browser submits it.
    fn form(amount: &str, category_id: i64) -> TransactionForm {
        let body = format!("type=expense&amount={amount}&date=2025-10-05&category={category_id}");

        serde_html_form::from_str(&body).unwrap()
    }

    #[tokio::test]
    async fn form_fragment_posts_to_create_endpoint() {
        let (state, _, _) = get_test_state();

        let response = get_create_transaction_form(State(state)).await;

        assert_status_ok(&response);
        let html = parse_html_fragment(response).await;
        assert_valid_html(&html);
        let form = must_get_form(&html);
        assert_hx_endpoint(&form, endpoints::CREATE_TRANSACTION, "hx-post");
    }

    #[tokio::test]
    async fn valid_form_creates_transaction() {
        let (state, user_id, category_id) = get_test_state();

        let response = create_transaction_endpoint(
            State(state.clone()),
            Extension(user_id),
            Form(form("12.30", category_id)),
        )
        .await;

        assert_status_ok(&response);
        assert_eq!(get_header(&response, HX_TRIGGER.as_str()), "transactions-changed");
        let html = parse_html_fragment(response).await;
        let message: String = html
            .select(&Selector::parse("#transaction-block p").unwrap())
            .next()
            .expect("no success message")
            .text()
            .collect();
        assert_eq!(message.trim(), "Transaction was added successfully!");

        let connection = state.db_connection.lock().unwrap();
        assert_eq!(count_transactions(user_id, &connection).unwrap(), 1);
        let transaction = get_transaction(1, user_id, &connection).unwrap();
        assert_eq!(transaction.amount.to_string(), "12.30");
        assert_eq!(transaction.user_id, user_id);
        assert_eq!(transaction.category_id, category_id);
    }

    #[tokio::test]
    async fn negative_amount_is_rejected() {
        let (state, user_id, category_id) = get_test_state();

        let response = create_transaction_endpoint(
            State(state.clone()),
            Extension(user_id),
            Form(form("-44", category_id)),
        )
        .await;

        assert_status_ok(&response);
        assert_eq!(get_header(&response, HX_RETARGET.as_str()), "#transaction-block");
        let html = parse_html_fragment(response).await;
        let form = must_get_form(&html);
        assert_field_error(&form, "amount", "Amount must be a positive number");

        let connection = state.db_connection.lock().unwrap();
        assert_eq!(count_transactions(user_id, &connection).unwrap(), 0);
    }

    #[tokio::test]
    async fn rejected_form_keeps_submitted_values() {
        let (state, user_id, category_id) = get_test_state();

        let response = create_transaction_endpoint(
            State(state),
            Extension(user_id),
            Form(form("abc", category_id)),
        )
        .await;

        let html = parse_html_fragment(response).await;
        let form = must_get_form(&html);
        assert_form_input_with_value(&form, "date", "date", "2025-10-05");
        assert_form_input_with_value(&form, "amount", "number", "abc");
        assert_field_error(&form, "amount", "\"abc\" is not a valid number");
    }

    #[test]
    fn browser_form_fields_map_onto_transaction_form() {
        let got: TransactionForm =
            serde_html_form::from_str("type=income&amount=12.30&date=2025-10-05&category=4")
                .unwrap();

        assert_eq!(
            got,
            TransactionForm {
                transaction_type: "income".to_owned(),
                amount: "12.30".to_owned(),
                date: "2025-10-05".to_owned(),
                category: "4".to_owned(),
            }
        );
    }
}
