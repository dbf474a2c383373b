//! Income, expense and category charts for a filtered set of transactions.
//!
//! Charts are built with charming as ECharts options and initialised by a
//! script inside the charts container, so they also render when htmx swaps
//! the container in.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, RawQuery, State},
    response::{Html, IntoResponse, Response},
};
use axum_htmx::HxRequest;
use charming::{
    Chart,
    component::{Axis, Grid, Legend, Title},
    element::{AxisType, Tooltip, Trigger},
    series::{Pie, bar::Bar},
};
use maud::{Markup, PreEscaped, html};
use rusqlite::Connection;
use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::{
    AppState, Error,
    auth::UserID,
    category::get_all_categories,
    endpoints,
    html::{ECHARTS_URL, HeadElement, LINK_STYLE, PAGE_CONTAINER_STYLE, base},
    navigation::NavBar,
    transaction::{
        TransactionType,
        aggregate::{CategoryTotal, Totals, get_category_totals, get_totals},
        filter::TransactionFilter,
        list::filter_form,
    },
};

const CONTAINER_ID: &str = "charts-container";

/// The state needed for the charts page.
#[derive(Debug, Clone)]
pub struct ChartsState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ChartsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A chart with the ID of the element it is drawn in.
struct TransactionChart {
    id: &'static str,
    chart: Chart,
}

/// Display the income vs expenditure bar chart and the per-category pie charts
/// for the transactions that match the query's filter.
pub async fn get_charts_page(
    State(state): State<ChartsState>,
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

    let container = match get_container(user_id, &filter, &connection) {
        Ok(container) => container,
        Err(error) => {
            tracing::error!("could not load chart data for user {user_id}: {error}");
            return error.into_response();
        }
    };

    if is_htmx {
        return Html(container.into_string()).into_response();
    }

    charts_view(&container).into_response()
}

fn get_container(
    user_id: UserID,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Markup, Error> {
    let categories = get_all_categories(connection)?;
    let totals = get_totals(user_id, filter, connection)?;

    let charts = if totals == Totals::default() {
        Vec::new()
    } else {
        let income = get_category_totals(user_id, filter, TransactionType::Income, connection)?;
        let expenses = get_category_totals(user_id, filter, TransactionType::Expense, connection)?;

        vec![
            TransactionChart {
                id: "income-expense-chart",
                chart: income_expense_bar_chart(&totals),
            },
            TransactionChart {
                id: "category-income-chart",
                chart: category_pie_chart(&income, "Income"),
            },
            TransactionChart {
                id: "category-expense-chart",
                chart: category_pie_chart(&expenses, "Expenses"),
            },
        ]
    };

    Ok(html! {
        div id=(CONTAINER_ID) class="w-full space-y-4"
        {
            (filter_form(filter, &categories, endpoints::TRANSACTION_CHARTS_VIEW, CONTAINER_ID))

            @if charts.is_empty() {
                p id="no-chart-data" class="p-4 text-center text-gray-500 dark:text-gray-400"
                {
                    "There are no transactions to chart. "
                    a href=(endpoints::TRANSACTIONS_VIEW) class=(LINK_STYLE) { "Add a transaction" }
                    " or change the filter."
                }
            } @else {
                section id="charts" class="grid grid-cols-1 xl:grid-cols-3 gap-4"
                {
                    @for chart in &charts {
                        div id=(chart.id) class="min-h-[380px] rounded dark:bg-gray-100" {}
                    }
                }

                script { (charts_script(&charts)) }
            }
        }
    })
}

fn charts_view(container: &Markup) -> Markup {
    let nav_bar = NavBar::new(endpoints::TRANSACTION_CHARTS_VIEW).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full max-w-6xl space-y-4"
            {
                h1 class="text-xl font-bold" { "Charts" }

                (container)
            }
        }
    };

    base(
        "Charts",
        &[HeadElement::ScriptLink(ECHARTS_URL.to_owned())],
        &content,
    )
}

/// Resizes whichever charts are on the page. htmx swaps in new charts without
/// reloading the page, so the listener is only added the first time.
const RESIZE_SCRIPT: &str = r#"if (!window.chartsResizeBound) {
    window.chartsResizeBound = true;
    window.addEventListener('resize', () => {
        document.querySelectorAll('#charts > div').forEach((element) => {
            const chart = echarts.getInstanceByDom(element);
            if (chart) {
                chart.resize();
            }
        });
    });
}"#;

fn charts_script(charts: &[TransactionChart]) -> PreEscaped<String> {
    let mut script = charts
        .iter()
        .map(|chart| {
            // A category name containing "</script>" must not end the script early.
            let options = chart.chart.to_string().replace("</", "<\\/");

            format!(
                r#"(function() {{
                    const chart = echarts.init(document.getElementById("{}"));
                    chart.setOption({options});
                }})();"#,
                chart.id
            )
        })
        .collect::<Vec<_>>();
    script.push(RESIZE_SCRIPT.to_owned());

    PreEscaped(script.join("\n"))
}

fn to_chart_value(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

fn income_expense_bar_chart(totals: &Totals) -> Chart {
    Chart::new()
        .title(Title::new().text("Income vs Expenditure"))
        .tooltip(Tooltip::new().trigger(Trigger::Axis))
        .grid(
            Grid::new()
                .left("3%")
                .right("4%")
                .bottom("3%")
                .contain_label(true),
        )
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .data(vec!["Income", "Expenditure"]),
        )
        .y_axis(Axis::new().type_(AxisType::Value))
        .series(Bar::new().name("Total").data(vec![
            to_chart_value(totals.income),
            to_chart_value(totals.expenses),
        ]))
}

fn category_pie_chart(category_totals: &[CategoryTotal], subtitle: &str) -> Chart {
    let data: Vec<(f64, String)> = category_totals
        .iter()
        .map(|total| (to_chart_value(total.total), total.category_name.to_string()))
        .collect();

    Chart::new()
        .title(
            Title::new()
                .text("Total Amount per Category")
                .subtext(subtitle),
        )
        .tooltip(Tooltip::new().trigger(Trigger::Item))
        .legend(Legend::new().bottom(0))
        .series(Pie::new().name(subtitle).radius("60%").data(data))
}
