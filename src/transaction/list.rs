//! The transactions page: a filter form, totals, and a paginated table.
//!
//! The page is served in three shapes:
//! - the full document for normal navigation,
//! - the `#transactions-container` fragment (filter form, totals and first
//!   page) when htmx requests `/transactions/`,
//! - the `#transaction-list` fragment (one page of rows plus the pagination
//!   controls) from `/get-transactions/`.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, RawQuery, State},
    response::{Html, IntoResponse, Response},
};
use axum_htmx::HxRequest;
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::UserID,
    category::{Category, get_all_categories},
    endpoints::{self, format_endpoint},
    html::{
        BUTTON_DELETE_STYLE, BUTTON_PRIMARY_STYLE, BUTTON_SECONDARY_STYLE, CATEGORY_BADGE_STYLE,
        FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE,
        TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, dollar_input_styles,
        format_count, format_currency,
    },
    navigation::NavBar,
    pagination::{
        PaginationConfig, create_pagination_indicators, page_count, pagination_nav, resolve_page,
    },
    transaction::{
        TransactionType,
        aggregate::{Totals, get_totals},
        filter::{
            Page, TransactionFilter, TransactionRow, count_filtered_transactions,
            get_transaction_rows, parse_query_pairs,
        },
        form::{TRANSACTION_BLOCK_TARGET, TRANSACTIONS_CHANGED_EVENT, transaction_block},
    },
};

const CONTAINER_ID: &str = "transactions-container";
const LIST_ID: &str = "transaction-list";

/// The state needed for the transactions page.
#[derive(Debug, Clone)]
pub struct TransactionsViewState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The config that controls how to display pages of transactions.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for TransactionsViewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// One page of filtered transactions and what is needed to link to the other pages.
struct ListPage<'a> {
    rows: Vec<TransactionRow>,
    filter: &'a TransactionFilter,
    current_page: u64,
    page_count: u64,
    total_count: u64,
}

fn load_page<'a>(
    user_id: UserID,
    filter: &'a TransactionFilter,
    requested_page: Option<&str>,
    config: &PaginationConfig,
    connection: &Connection,
) -> Result<ListPage<'a>, Error> {
    let total_count = count_filtered_transactions(user_id, filter, connection)?;
    let page_count = page_count(total_count, config.page_size);
    let current_page = resolve_page(requested_page, page_count);
    let rows = get_transaction_rows(
        user_id,
        filter,
        Some(Page::new(current_page, config.page_size)),
        connection,
    )?;

    Ok(ListPage {
        rows,
        filter,
        current_page,
        page_count,
        total_count,
    })
}

/// Display the first page of the user's transactions that match the query's filter.
///
/// htmx requests only get the transactions container so that the filter form
/// can swap it in place.
pub async fn get_transactions_page(
    State(state): State<TransactionsViewState>,
    Extension(user_id): Extension<UserID>,
    HxRequest(is_htmx): HxRequest,
    RawQuery(query): RawQuery,
) -> Response {
    let filter = TransactionFilter::from_query_string(query.as_deref());

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let container = match get_container(user_id, &filter, &state.pagination_config, &connection)
    {
        Ok(container) => container,
        Err(error) => {
            tracing::error!("could not load transactions for user {user_id}: {error}");
            return error.into_response();
        }
    };

    if is_htmx {
        return Html(container.into_string()).into_response();
    }

    transactions_view(&container).into_response()
}

/// Display one page of transactions, selected by the `page` query parameter.
///
/// The other query parameters are read as the filter so that every page of the
/// list shows the same set of transactions.
pub async fn get_transactions_fragment(
    State(state): State<TransactionsViewState>,
    Extension(user_id): Extension<UserID>,
    RawQuery(query): RawQuery,
) -> Response {
    let pairs = parse_query_pairs(query.as_deref());
    let filter = TransactionFilter::from_query_pairs(
        pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())),
    );
    let requested_page = pairs
        .iter()
        .rev()
        .find(|(key, _)| key == "page")
        .map(|(_, value)| value.as_str());

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match load_page(
        user_id,
        &filter,
        requested_page,
        &state.pagination_config,
        &connection,
    ) {
        Ok(page) => {
            Html(transaction_list(&page, state.pagination_config.max_pages).into_string())
                .into_response()
        }
        Err(error) => {
            tracing::error!("could not load transactions for user {user_id}: {error}");
            error.into_alert_response()
        }
    }
}

fn get_container(
    user_id: UserID,
    filter: &TransactionFilter,
    config: &PaginationConfig,
    connection: &Connection,
) -> Result<Markup, Error> {
    let categories = get_all_categories(connection)?;
    let totals = get_totals(user_id, filter, connection)?;
    let page = load_page(user_id, filter, None, config, connection)?;

    Ok(transactions_container(
        &categories,
        &totals,
        &page,
        config.max_pages,
    ))
}

fn transactions_view(container: &Markup) -> Markup {
    let nav_bar = NavBar::new(endpoints::TRANSACTIONS_VIEW).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full max-w-5xl space-y-4"
            {
                header class="flex justify-between flex-wrap items-end gap-4"
                {
                    h1 class="text-xl font-bold" { "Transactions" }

                    div class="flex gap-4"
                    {
                        button
                            type="button"
                            hx-get=(endpoints::CREATE_TRANSACTION)
                            hx-target=(TRANSACTION_BLOCK_TARGET)
                            hx-swap="outerHTML"
                            hx-target-error="#alert-container"
                            class=(BUTTON_SECONDARY_STYLE)
                        {
                            "Add Transaction"
                        }

                        button
                            type="button"
                            hx-get=(endpoints::IMPORT)
                            hx-target=(TRANSACTION_BLOCK_TARGET)
                            hx-swap="outerHTML"
                            hx-target-error="#alert-container"
                            class=(BUTTON_SECONDARY_STYLE)
                        {
                            "Import"
                        }
                    }
                }

                div class="flex justify-center" { (transaction_block(html! {})) }

                (container)
            }
        }
    };

    base("Transactions", &[dollar_input_styles()], &content)
}

fn transactions_container(
    categories: &[Category],
    totals: &Totals,
    page: &ListPage<'_>,
    max_pages: u64,
) -> Markup {
    let filter = page.filter;

    html! {
        div
            id=(CONTAINER_ID)
            class="space-y-4"
            hx-get=(filter.to_url(endpoints::TRANSACTIONS_VIEW))
            hx-trigger={ (TRANSACTIONS_CHANGED_EVENT) " from:body" }
            hx-swap="outerHTML"
        {
            (filter_form(filter, categories, endpoints::TRANSACTIONS_VIEW, CONTAINER_ID))

            (totals_panel(totals))

            div class="flex justify-between flex-wrap items-center gap-4"
            {
                p class="text-sm text-gray-500 dark:text-gray-400"
                {
                    (format_count(page.total_count as usize)) " transactions"
                }

                div class="flex gap-4"
                {
                    a
                        href=(filter.to_url(endpoints::TRANSACTION_CHARTS_VIEW))
                        class=(LINK_STYLE)
                    {
                        "Charts"
                    }

                    button
                        type="button"
                        hx-get=(filter.to_url(endpoints::EXPORT))
                        class=(LINK_STYLE)
                    {
                        "Export CSV"
                    }
                }
            }

            (transaction_list(page, max_pages))
        }
    }
}

/// The form for narrowing down transactions, which reloads the element
/// `container_id` with the response from `route`.
pub(super) fn filter_form(
    filter: &TransactionFilter,
    categories: &[Category],
    route: &str,
    container_id: &str,
) -> Markup {
    let selected_type = filter.transaction_type.map(|transaction_type| transaction_type.as_str());

    html! {
        form
            hx-get=(route)
            hx-target={ "#" (container_id) }
            hx-swap="outerHTML"
            hx-push-url="true"
            class="grid gap-4 md:grid-cols-4 items-end p-4 bg-white rounded-lg shadow dark:bg-gray-800"
        {
            div
            {
                label for="transaction_type" class=(FORM_LABEL_STYLE) { "Type" }

                select name="transaction_type" id="transaction_type" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" selected[selected_type.is_none()] { "Any" }

                    @for transaction_type in [TransactionType::Income, TransactionType::Expense] {
                        option
                            value=(transaction_type.as_str())
                            selected[selected_type == Some(transaction_type.as_str())]
                        {
                            @match transaction_type {
                                TransactionType::Income => { "Income" }
                                TransactionType::Expense => { "Expense" }
                            }
                        }
                    }
                }
            }

            div
            {
                label for="start_date" class=(FORM_LABEL_STYLE) { "Date From" }

                input
                    type="date"
                    name="start_date"
                    id="start_date"
                    value=[filter.start_date]
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="end_date" class=(FORM_LABEL_STYLE) { "Date To" }

                input
                    type="date"
                    name="end_date"
                    id="end_date"
                    value=[filter.end_date]
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="category" class=(FORM_LABEL_STYLE) { "Category" }

                select name="category" id="category" multiple class=(FORM_TEXT_INPUT_STYLE)
                {
                    @for category in categories {
                        option
                            value=(category.id)
                            selected[filter.category_ids.contains(&category.id)]
                        {
                            (category.name)
                        }
                    }
                }
            }

            div class="md:col-span-4"
            {
                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Filter" }
            }
        }
    }
}

fn totals_panel(totals: &Totals) -> Markup {
    let card = |label: &str, amount: String, style: &str| {
        html! {
            div class="p-4 bg-white rounded-lg shadow dark:bg-gray-800"
            {
                p class="text-sm text-gray-500 dark:text-gray-400" { (label) }
                p class={ "text-2xl font-bold " (style) } { (amount) }
            }
        }
    };

    html! {
        div id="totals" class="grid gap-4 md:grid-cols-3"
        {
            (card("Total Income", format_currency(totals.income), "text-green-600 dark:text-green-400"))
            (card("Total Expenses", format_currency(totals.expenses), "text-red-600 dark:text-red-400"))
            (card("Net Income", format_currency(totals.net_income()), ""))
        }
    }
}

fn transaction_list(page: &ListPage<'_>, max_pages: u64) -> Markup {
    let filter_query = page.filter.to_query_string();
    let page_url = |page_number: u64| {
        if filter_query.is_empty() {
            format!("{}?page={page_number}", endpoints::GET_TRANSACTIONS)
        } else {
            format!(
                "{}?{filter_query}&page={page_number}",
                endpoints::GET_TRANSACTIONS
            )
        }
    };
    let indicators = create_pagination_indicators(page.current_page, page.page_count, max_pages);

    html! {
        div id=(LIST_ID) class="w-full overflow-x-auto"
        {
            table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Type" }
                        th scope="col" class="px-6 py-3 text-right" { "Amount" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Actions" }
                    }
                }

                tbody
                {
                    @for row in &page.rows {
                        (table_row(row))
                    }

                    @if page.rows.is_empty() {
                        tr
                        {
                            td colspan="5" class="px-6 py-4 text-center text-gray-500 dark:text-gray-400"
                            {
                                "No transactions found."
                            }
                        }
                    }
                }
            }

            @if page.page_count > 1 {
                (pagination_nav(&indicators, page_url, &format!("#{LIST_ID}")))
            }
        }
    }
}

fn table_row(row: &TransactionRow) -> Markup {
    let update_url = format_endpoint(endpoints::UPDATE_TRANSACTION, row.id);
    let delete_url = format_endpoint(endpoints::DELETE_TRANSACTION, row.id);
    let amount_style = match row.transaction_type {
        TransactionType::Income => "px-6 py-4 text-right text-green-600 dark:text-green-400",
        TransactionType::Expense => "px-6 py-4 text-right",
    };

    html! {
        tr class=(TABLE_ROW_STYLE) data-transaction-id=(row.id)
        {
            td class=(TABLE_CELL_STYLE) { time datetime=(row.date) { (row.date) } }
            td class=(TABLE_CELL_STYLE) { span class=(CATEGORY_BADGE_STYLE) { (row.category_name) } }
            td class=(TABLE_CELL_STYLE) { (row.transaction_type) }
            td class=(amount_style) { (format_currency(row.amount.as_decimal())) }
            td class=(TABLE_CELL_STYLE)
            {
                div class="flex gap-4"
                {
                    button
                        type="button"
                        hx-get=(update_url)
                        hx-target=(TRANSACTION_BLOCK_TARGET)
                        hx-swap="outerHTML"
                        hx-target-error="#alert-container"
                        class=(LINK_STYLE)
                    {
                        "Edit"
                    }

                    button
                        type="button"
                        hx-delete=(delete_url)
                        hx-confirm={
                            "Are you sure you want to delete the transaction of "
                            (row.amount) " on " (row.date) "? This cannot be undone."
                        }
                        hx-target=(TRANSACTION_BLOCK_TARGET)
                        hx-swap="outerHTML"
                        hx-target-error="#alert-container"
                        class=(BUTTON_DELETE_STYLE)
                    {
                        "Delete"
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{RawQuery, State},
        response::Response,
    };
    use axum_htmx::HxRequest;
    use rusqlite::Connection;
    use scraper::{Html, Selector};

    use crate::{
        auth::UserID,
        pagination::PaginationConfig,
        test_utils::{
            assert_status_ok, assert_valid_html, create_test_category, create_test_transaction,
            create_test_user, get_test_connection, parse_html_document, parse_html_fragment,
        },
        transaction::{Transaction, TransactionType, create_transaction},
    };

    use super::{TransactionsViewState, get_transactions_fragment, get_transactions_page};

    struct Fixture {
        state: TransactionsViewState,
        alice: UserID,
        food_id: i64,
    }

    /// Alice has 25 expenses of $1.00 in Food, one $500 salary, and Bob has one expense.
    fn get_fixture() -> Fixture {
        let connection = get_test_connection();
        let alice = create_test_user("alice", &connection);
        let bob = create_test_user("bob", &connection);
        let food = create_test_category("Food", &connection);
        let salary = create_test_category("Salary", &connection);

        for _ in 0..25 {
            create_test_transaction(alice.id, food.id, "1.00", &connection);
        }
        create_transaction(
            Transaction::build(
                "500".parse().unwrap(),
                time::macros::date!(2025 - 10 - 20),
                salary.id,
            )
            .transaction_type(TransactionType::Income),
            alice.id,
            &connection,
        )
        .unwrap();
        create_test_transaction(bob.id, food.id, "999.00", &connection);

        Fixture {
            state: state_with(connection),
            alice: alice.id,
            food_id: food.id,
        }
    }

    fn state_with(connection: Connection) -> TransactionsViewState {
        TransactionsViewState {
            db_connection: Arc::new(Mutex::new(connection)),
            pagination_config: PaginationConfig {
                page_size: 10,
                max_pages: 5,
            },
        }
    }

    async fn get_page(fixture: &Fixture, is_htmx: bool, query: Option<&str>) -> Response {
        get_transactions_page(
            State(fixture.state.clone()),
            Extension(fixture.alice),
            HxRequest(is_htmx),
            RawQuery(query.map(str::to_owned)),
        )
        .await
    }

    fn texts(html: &Html, selector: &str) -> Vec<String> {
        html.select(&Selector::parse(selector).unwrap())
            .map(|element| element.text().collect::<String>().trim().to_owned())
            .collect()
    }

    #[tokio::test]
    async fn full_page_shows_totals_and_first_page() {
        let fixture = get_fixture();

        let response = get_page(&fixture, false, None).await;

        assert_status_ok(&response);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        assert_eq!(
            texts(&html, "#totals p.text-2xl"),
            ["$500.00", "$25.00", "$475.00"]
        );
        assert_eq!(html.select(&Selector::parse("tbody tr").unwrap()).count(), 10);
        assert_eq!(
            html.select(&Selector::parse("#transaction-block").unwrap()).count(),
            1
        );
        // Newest first, so the salary is at the top.
        assert_eq!(texts(&html, "tbody tr td:nth-child(3)")[0], "income");
    }

    #[tokio::test]
    async fn htmx_request_gets_container_only() {
        let fixture = get_fixture();

        let response = get_page(&fixture, true, Some("transaction_type=income")).await;

        assert_status_ok(&response);
        let html = parse_html_fragment(response).await;
        assert_eq!(html.select(&Selector::parse("nav").unwrap()).count(), 0);
        assert_eq!(
            html.select(&Selector::parse("#transactions-container").unwrap())
                .count(),
            1
        );
        assert_eq!(
            texts(&html, "#totals p.text-2xl"),
            ["$500.00", "$0.00", "$500.00"]
        );
        assert_eq!(texts(&html, "tbody tr td:nth-child(3)"), ["income"]);
    }

    #[tokio::test]
    async fn filter_form_keeps_selected_values() {
        let fixture = get_fixture();
        let query = format!(
            "transaction_type=expense&start_date=2025-10-01&category={}",
            fixture.food_id
        );

        let response = get_page(&fixture, true, Some(&query)).await;

        let html = parse_html_fragment(response).await;
        let selected = texts(&html, "option[selected]");
        assert_eq!(selected, ["Expense", "Food"]);
        let start_date = html
            .select(&Selector::parse("input[name=start_date]").unwrap())
            .next()
            .unwrap();
        assert_eq!(start_date.value().attr("value"), Some("2025-10-01"));
    }

    #[tokio::test]
    async fn pagination_links_keep_filter() {
        let fixture = get_fixture();
        let query = format!("category={}", fixture.food_id);

        let response = get_page(&fixture, true, Some(&query)).await;

        let html = parse_html_fragment(response).await;
        let links: Vec<_> = html
            .select(&Selector::parse("nav a[hx-get]").unwrap())
            .map(|link| link.value().attr("hx-get").unwrap().to_owned())
            .collect();
        let want = format!("/get-transactions/?category={}&page=2", fixture.food_id);
        assert!(links.contains(&want), "want link {want} in {links:?}");
    }

    #[tokio::test]
    async fn fragment_returns_requested_page() {
        let fixture = get_fixture();

        let response = get_transactions_fragment(
            State(fixture.state.clone()),
            Extension(fixture.alice),
            RawQuery(Some("page=3".to_owned())),
        )
        .await;

        assert_status_ok(&response);
        let html = parse_html_fragment(response).await;
        assert_eq!(html.select(&Selector::parse("tbody tr").unwrap()).count(), 6);
        assert_eq!(texts(&html, "span[aria-current=page]"), ["3"]);
        assert_eq!(html.select(&Selector::parse("#totals").unwrap()).count(), 0);
    }

    #[tokio::test]
    async fn fragment_clamps_page_past_the_end() {
        let fixture = get_fixture();

        let response = get_transactions_fragment(
            State(fixture.state.clone()),
            Extension(fixture.alice),
            RawQuery(Some("page=99".to_owned())),
        )
        .await;

        let html = parse_html_fragment(response).await;
        assert_eq!(texts(&html, "span[aria-current=page]"), ["3"]);
    }

    #[tokio::test]
    async fn fragment_falls_back_to_first_page() {
        let fixture = get_fixture();

        let response = get_transactions_fragment(
            State(fixture.state.clone()),
            Extension(fixture.alice),
            RawQuery(Some("page=abc".to_owned())),
        )
        .await;

        let html = parse_html_fragment(response).await;
        assert_eq!(texts(&html, "span[aria-current=page]"), ["1"]);
    }

    #[tokio::test]
    async fn empty_list_shows_message() {
        let connection = get_test_connection();
        let user = create_test_user("carol", &connection);
        let state = state_with(connection);

        let response = get_transactions_page(
            State(state),
            Extension(user.id),
            HxRequest(true),
            RawQuery(None),
        )
        .await;

        let html = parse_html_fragment(response).await;
        assert_eq!(texts(&html, "tbody td"), ["No transactions found."]);
    }
}
