//! The public landing page.

use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;
use maud::{Markup, html};

use crate::{
    auth::get_token_from_cookies,
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, BUTTON_SECONDARY_STYLE, PAGE_CONTAINER_STYLE, base},
};

/// Display the landing page.
///
/// Visitors with a valid session are pointed at their transactions, everyone
/// else at the log-in and registration pages.
pub async fn get_home_page(jar: PrivateCookieJar) -> Response {
    let is_logged_in = get_token_from_cookies(&jar).is_ok();

    home_view(is_logged_in).into_response()
}

fn home_view(is_logged_in: bool) -> Markup {
    let content = html! {
        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full max-w-xl space-y-6 text-center"
            {
                h1 class="text-4xl font-extrabold tracking-tight" { "Finance Tracker" }

                p class="text-lg text-gray-500 dark:text-gray-400"
                {
                    "Keep track of your income and expenses, see where your money goes, "
                    "and take your records with you as CSV."
                }

                nav id="home-links" class="flex justify-center gap-4"
                {
                    @if is_logged_in {
                        a href=(endpoints::TRANSACTIONS_VIEW) class=(BUTTON_PRIMARY_STYLE)
                        {
                            "View transactions"
                        }
                        a href=(endpoints::LOG_OUT) class=(BUTTON_SECONDARY_STYLE) { "Log out" }
                    } @else {
                        a href=(endpoints::LOG_IN_VIEW) class=(BUTTON_PRIMARY_STYLE) { "Log in" }
                        a href=(endpoints::REGISTER_VIEW) class=(BUTTON_SECONDARY_STYLE)
                        {
                            "Register"
                        }
                    }
                }
            }
        }
    };

    base("Home", &[], &content)
}
