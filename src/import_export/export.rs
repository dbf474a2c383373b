use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, OriginalUri, RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_htmx::{HxRedirect, HxRequest};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::UserID,
    import_export::record::write_csv,
    transaction::{TransactionFilter, get_transaction_rows},
};

const EXPORT_FILE_NAME: &str = "transactions.csv";

/// The state needed to export transactions.
#[derive(Debug, Clone)]
pub struct ExportState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ExportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that downloads the user's transactions matching the query's
/// filter as a CSV file.
///
/// htmx cannot save a download, so htmx requests are redirected to the same
/// URL to have the browser fetch it instead.
pub async fn export_transactions(
    State(state): State<ExportState>,
    Extension(user_id): Extension<UserID>,
    HxRequest(is_htmx): HxRequest,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> Response {
    if is_htmx {
        let path = uri
            .path_and_query()
            .map(|path_and_query| path_and_query.as_str())
            .unwrap_or(uri.path());

        return (HxRedirect(path.to_owned()), StatusCode::OK).into_response();
    }

    let filter = TransactionFilter::from_query_string(query.as_deref());

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let csv = match get_transaction_rows(user_id, &filter, None, &connection)
        .and_then(|rows| write_csv(&rows))
    {
        Ok(csv) => csv,
        Err(error) => {
            tracing::error!("could not export transactions for user {user_id}: {error}");
            return error.into_response();
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
            ),
        ],
        csv,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{OriginalUri, RawQuery, State},
        http::Uri,
        response::Response,
    };
    use axum_htmx::HxRequest;
    use time::macros::date;

    use crate::{
        test_utils::{
            assert_content_type, assert_hx_redirect, assert_status_ok, create_test_category,
            create_test_transaction, create_test_user, get_header, get_test_connection,
        },
        transaction::{Transaction, TransactionType, create_transaction},
    };

    use super::{ExportState, export_transactions};

    async fn body_text(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn downloads_csv_attachment() {
        let connection = get_test_connection();
        let user = create_test_user("alice", &connection);
        let food = create_test_category("Food", &connection);
        create_test_transaction(user.id, food.id, "12.5", &connection);
        let state = ExportState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = export_transactions(
            State(state),
            Extension(user.id),
            HxRequest(false),
            OriginalUri(Uri::from_static("/export")),
            RawQuery(None),
        )
        .await;

        assert_status_ok(&response);
        assert_content_type(&response, "text/csv; charset=utf-8");
        assert_eq!(
            get_header(&response, "content-disposition"),
            "attachment; filename=\"transactions.csv\""
        );
        assert_eq!(
            body_text(response).await,
            "amount,type,date,category\n12.50,expense,2025-10-05,Food\n"
        );
    }

    #[tokio::test]
    async fn only_exports_filtered_transactions_of_user() {
        let connection = get_test_connection();
        let alice = create_test_user("alice", &connection);
        let bob = create_test_user("bob", &connection);
        let food = create_test_category("Food", &connection);
        let salary = create_test_category("Salary", &connection);
        create_test_transaction(alice.id, food.id, "12.50", &connection);
        create_test_transaction(bob.id, food.id, "99.00", &connection);
        create_transaction(
            Transaction::build("1000".parse().unwrap(), date!(2025 - 10 - 01), salary.id)
                .transaction_type(TransactionType::Income),
            alice.id,
            &connection,
        )
        .unwrap();
        let state = ExportState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = export_transactions(
            State(state),
            Extension(alice.id),
            HxRequest(false),
            OriginalUri(Uri::from_static("/export?transaction_type=income")),
            RawQuery(Some("transaction_type=income".to_owned())),
        )
        .await;

        assert_eq!(
            body_text(response).await,
            "amount,type,date,category\n1000.00,income,2025-10-01,Salary\n"
        );
    }

    #[tokio::test]
    async fn htmx_request_redirects_to_download() {
        let connection = get_test_connection();
        let user = create_test_user("alice", &connection);
        let state = ExportState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = export_transactions(
            State(state),
            Extension(user.id),
            HxRequest(true),
            OriginalUri(Uri::from_static("/export?transaction_type=expense&category=1")),
            RawQuery(Some("transaction_type=expense&category=1".to_owned())),
        )
        .await;

        assert_status_ok(&response);
        assert_hx_redirect(&response, "/export?transaction_type=expense&category=1");
    }
}
