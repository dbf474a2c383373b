//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth::{
        auth_guard, get_log_in_page, get_log_out, get_register_page, post_log_in, register_user,
    },
    endpoints,
    home::get_home_page,
    import_export::{export_transactions, get_import_form, import_transactions},
    internal_server_error::get_internal_server_error_page,
    not_found::get_404_not_found,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_charts_page,
        get_create_transaction_form, get_transactions_fragment, get_transactions_page,
        get_update_transaction_form, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Everything to do with transactions sits behind [auth_guard], which puts the
/// logged in user's ID into the request extensions.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::ROOT, get(get_home_page))
        .route(endpoints::LOG_IN_VIEW, get(get_log_in_page))
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(endpoints::REGISTER_VIEW, get(get_register_page))
        .route(endpoints::USERS, post(register_user))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        );

    let protected_routes = Router::new()
        .route(endpoints::TRANSACTIONS_VIEW, get(get_transactions_page))
        .route(endpoints::TRANSACTION_CHARTS_VIEW, get(get_charts_page))
        .route(
            endpoints::CREATE_TRANSACTION,
            get(get_create_transaction_form).post(create_transaction_endpoint),
        )
        .route(
            endpoints::UPDATE_TRANSACTION,
            get(get_update_transaction_form).post(update_transaction_endpoint),
        )
        .route(
            endpoints::DELETE_TRANSACTION,
            delete(delete_transaction_endpoint),
        )
        .route(endpoints::GET_TRANSACTIONS, get(get_transactions_fragment))
        .route(endpoints::EXPORT, get(export_transactions))
        .route(
            endpoints::IMPORT,
            get(get_import_form).post(import_transactions),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .fallback(get_404_not_found)
        .with_state(state)
}
