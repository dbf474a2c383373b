//! Uploading a CSV file of transactions.
//!
//! The whole file is checked before anything is written. If any line is
//! invalid nothing is imported, otherwise the new transactions are inserted in
//! a single SQLite transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Multipart, State, multipart::Field},
    response::{Html, IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::UserID,
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, BUTTON_SECONDARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        loading_spinner,
    },
    import_export::record::{commit, dry_run, read_csv},
    transaction::{TRANSACTION_BLOCK_TARGET, success_response, transaction_block},
};

/// The name of the multipart field that holds the uploaded file.
const FILE_FIELD: &str = "file";

/// The state needed to import transactions.
#[derive(Debug, Clone)]
pub struct ImportState {
    /// The database connection for storing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ImportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Render the upload form into the transaction block.
pub async fn get_import_form() -> Response {
    Html(import_form_view().into_string()).into_response()
}

fn import_form_view() -> Markup {
    let spinner = loading_spinner();

    let content = html! {
        form
            hx-post=(endpoints::IMPORT)
            hx-target=(TRANSACTION_BLOCK_TARGET)
            hx-swap="outerHTML"
            enctype="multipart/form-data"
            hx-disabled-elt="#file, #import-button"
            hx-indicator="#import-indicator"
            hx-target-error="#alert-container"
            class="w-full space-y-4 p-6 bg-white rounded-lg shadow dark:bg-gray-800"
        {
            div
            {
                label for="file" class=(FORM_LABEL_STYLE) { "CSV file" }

                input
                    id="file"
                    type="file"
                    name=(FILE_FIELD)
                    accept=".csv,text/csv"
                    required
                    class=(FORM_TEXT_INPUT_STYLE);

                p class="mt-2 text-sm text-gray-500 dark:text-gray-400"
                {
                    "The file needs the columns amount, type, date and category. "
                    "Transactions you already have are skipped."
                }
            }

            div class="flex gap-4"
            {
                button type="submit" id="import-button" class=(BUTTON_PRIMARY_STYLE)
                {
                    span class="inline htmx-indicator" id="import-indicator" { (spinner) }
                    " Import"
                }

                button
                    type="button"
                    class=(BUTTON_SECONDARY_STYLE)
                    onclick="this.closest('form').remove()"
                {
                    "Cancel"
                }
            }
        }
    };

    transaction_block(content)
}

/// A route handler that imports the transactions in an uploaded CSV file for
/// the logged in user.
///
/// Transactions that the user already has, or that appear earlier in the
/// file, are skipped. The success message counts every data line of the file.
pub async fn import_transactions(
    State(state): State<ImportState>,
    Extension(user_id): Extension<UserID>,
    mut multipart: Multipart,
) -> Result<Response, Response> {
    let csv_text = read_uploaded_file(&mut multipart).await.map_err(|error| {
        tracing::warn!("user {user_id} uploaded an unreadable file: {error}");
        error.into_alert_response()
    })?;

    let records = read_csv(&csv_text).map_err(|error| {
        tracing::warn!("user {user_id} uploaded an invalid CSV file: {error}");
        error.into_alert_response()
    })?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError.into_alert_response()
    })?;

    let plan = match dry_run(&records, user_id, &connection) {
        Ok(Ok(plan)) => plan,
        Ok(Err(row_errors)) => {
            for row_error in &row_errors {
                tracing::warn!(
                    "import for user {user_id} failed on line {}: {}",
                    row_error.line,
                    row_error.message
                );
            }

            return Err(Error::InvalidCSV(format!("{} invalid lines", row_errors.len()))
                .into_alert_response());
        }
        Err(error) => {
            tracing::error!("could not check the import for user {user_id}: {error}");
            return Err(error.into_alert_response());
        }
    };

    let row_count = plan.row_count;
    let skipped_count = plan.skipped_count();

    let inserted = commit(plan, user_id, &connection).map_err(|error| {
        tracing::error!("could not import transactions for user {user_id}: {error}");
        Error::InvalidCSV(error.to_string()).into_alert_response()
    })?;

    tracing::info!(
        "imported {} transactions for user {user_id}, skipped {skipped_count} duplicates",
        inserted.len()
    );

    Ok(success_response(&format!(
        "{row_count} transactions were uploaded successfully"
    )))
}

/// Read the text of the first multipart field named [FILE_FIELD].
async fn read_uploaded_file(multipart: &mut Multipart) -> Result<String, Error> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| Error::MultipartError(error.to_string()))?
    {
        if field.name() == Some(FILE_FIELD) {
            return parse_multipart_field(field).await;
        }
    }

    Err(Error::MultipartError(format!(
        "the form has no field named \"{FILE_FIELD}\""
    )))
}

async fn parse_multipart_field(field: Field<'_>) -> Result<String, Error> {
    let file_name = match field.file_name() {
        Some(file_name) => file_name.to_owned(),
        None => {
            tracing::error!("Could not get file name from multipart form field: {field:#?}");
            return Err(Error::MultipartError(
                "Could not get file name from multipart form field".to_owned(),
            ));
        }
    };

    let is_csv = field.content_type() == Some("text/csv")
        || file_name.to_lowercase().ends_with(".csv");
    if !is_csv {
        return Err(Error::NotCSV);
    }

    let data = match field.text().await {
        Ok(data) => data,
        Err(error) => {
            tracing::error!("Could not read data from multipart form field: {error}");
            return Err(Error::MultipartError(
                "Could not read data from multipart form field.".to_owned(),
            ));
        }
    };

    tracing::debug!("Received file '{}' that is {} bytes", file_name, data.len());

    Ok(data)
}
