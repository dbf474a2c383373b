//! The form shared by the create and update transaction fragments.
//!
//! Form values are kept as raw strings so that an invalid submission can be
//! rendered back to the user exactly as they typed it, with an error message
//! next to each offending field.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_htmx::{HX_TRIGGER, HxRetarget};
use maud::{Markup, html};
use serde::{Deserialize, Serialize};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    category::Category,
    database_id::CategoryId,
    html::{
        BUTTON_PRIMARY_STYLE, BUTTON_SECONDARY_STYLE, FORM_ERROR_STYLE, FORM_LABEL_STYLE,
        FORM_RADIO_GROUP_STYLE, FORM_RADIO_INPUT_STYLE, FORM_RADIO_LABEL_STYLE,
        FORM_TEXT_INPUT_STYLE,
    },
    transaction::{Amount, Transaction, TransactionBuilder, TransactionType},
};

/// The ID of the element that transaction forms and messages are swapped into.
pub const TRANSACTION_BLOCK_ID: &str = "transaction-block";

/// The CSS selector for [TRANSACTION_BLOCK_ID].
pub const TRANSACTION_BLOCK_TARGET: &str = "#transaction-block";

/// The event that tells the transaction list to reload itself.
pub const TRANSACTIONS_CHANGED_EVENT: &str = "transactions-changed";

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

const REQUIRED_MESSAGE: &str = "This field is required.";

/// The raw form data for creating or updating a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionForm {
    /// Either "income" or "expense".
    #[serde(rename = "type", default)]
    pub transaction_type: String,
    /// The amount as a decimal string, e.g. "12.50".
    #[serde(default)]
    pub amount: String,
    /// An ISO calendar date, e.g. "2025-10-05".
    #[serde(default)]
    pub date: String,
    /// The ID of the chosen category.
    #[serde(default)]
    pub category: String,
}

impl TransactionForm {
    /// An empty expense form dated `date`.
    pub fn new(date: Date) -> Self {
        Self {
            transaction_type: TransactionType::Expense.to_string(),
            date: date.to_string(),
            ..Default::default()
        }
    }

    /// A form pre-filled with the fields of `transaction`.
    pub fn from_transaction(transaction: &Transaction) -> Self {
        Self {
            transaction_type: transaction.transaction_type.to_string(),
            amount: transaction.amount.to_string(),
            date: transaction.date.to_string(),
            category: transaction.category_id.to_string(),
        }
    }

    /// Check every field and build the transaction it describes.
    ///
    /// `categories` are the categories the user may choose from.
    ///
    /// # Errors
    /// Returns a [FormErrors] with a message for each invalid field.
    pub fn validate(&self, categories: &[Category]) -> Result<TransactionBuilder, FormErrors> {
        let transaction_type = parse_transaction_type(&self.transaction_type);
        let amount = parse_amount(&self.amount);
        let date = parse_date(&self.date);
        let category_id = parse_category(&self.category, categories);

        match (transaction_type, amount, date, category_id) {
            (Ok(transaction_type), Ok(amount), Ok(date), Ok(category_id)) => {
                Ok(Transaction::build(amount, date, category_id).transaction_type(transaction_type))
            }
            (transaction_type, amount, date, category_id) => Err(FormErrors {
                transaction_type: transaction_type.err(),
                amount: amount.err(),
                date: date.err(),
                category: category_id.err(),
            }),
        }
    }
}

/// The error message for each invalid field of a [TransactionForm].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub transaction_type: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
}

fn parse_transaction_type(value: &str) -> Result<TransactionType, String> {
    if value.trim().is_empty() {
        return Err(REQUIRED_MESSAGE.to_owned());
    }

    value
        .parse()
        .map_err(|_| "Choose either income or expense.".to_owned())
}

fn parse_amount(value: &str) -> Result<Amount, String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(REQUIRED_MESSAGE.to_owned());
    }

    value.parse().map_err(|error| match error {
        Error::InvalidAmount(message) => message,
        error => error.to_string(),
    })
}

fn parse_date(value: &str) -> Result<Date, String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(REQUIRED_MESSAGE.to_owned());
    }

    Date::parse(value, DATE_FORMAT).map_err(|_| "Enter a valid date.".to_owned())
}

fn parse_category(value: &str, categories: &[Category]) -> Result<CategoryId, String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(REQUIRED_MESSAGE.to_owned());
    }

    value
        .parse::<CategoryId>()
        .ok()
        .filter(|id| categories.iter().any(|category| category.id == *id))
        .ok_or_else(|| "Choose one of the available categories.".to_owned())
}

/// Wrap `content` in the element that transaction forms and messages are swapped into.
pub fn transaction_block(content: Markup) -> Markup {
    html! {
        div id=(TRANSACTION_BLOCK_ID) class="w-full max-w-md" { (content) }
    }
}

/// Render the transaction form for submitting to `action`.
pub fn transaction_form(
    form: &TransactionForm,
    errors: &FormErrors,
    categories: &[Category],
    action: &str,
    submit_label: &str,
) -> Markup {
    let is_income = form.transaction_type.trim().eq_ignore_ascii_case("income");

    let content = html! {
        form
            hx-post=(action)
            hx-target=(TRANSACTION_BLOCK_TARGET)
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            class="w-full space-y-4 md:space-y-6 p-6 bg-white rounded-lg shadow dark:bg-gray-800"
        {
            fieldset class="space-y-2"
            {
                legend class=(FORM_LABEL_STYLE) { "Type" }

                div class=(FORM_RADIO_GROUP_STYLE)
                {
                    (radio_option("type", "type-expense", "expense", "Expense", !is_income))
                    (radio_option("type", "type-income", "income", "Income", is_income))
                }

                (field_error(errors.transaction_type.as_deref()))
            }

            div
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }

                div class="input-wrapper w-full"
                {
                    input
                        name="amount"
                        id="amount"
                        type="number"
                        step="0.01"
                        min="0.01"
                        placeholder="0.00"
                        required
                        value=(form.amount)
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                (field_error(errors.amount.as_deref()))
            }

            div
            {
                label for="date" class=(FORM_LABEL_STYLE) { "Date" }

                input
                    name="date"
                    id="date"
                    type="date"
                    required
                    value=(form.date)
                    class=(FORM_TEXT_INPUT_STYLE);

                (field_error(errors.date.as_deref()))
            }

            fieldset class="space-y-2"
            {
                legend class=(FORM_LABEL_STYLE) { "Category" }

                @if categories.is_empty() {
                    p class="text-sm text-gray-500 dark:text-gray-400"
                    {
                        "There are no categories yet. Add one with the categories command."
                    }
                } @else {
                    div class=(FORM_RADIO_GROUP_STYLE)
                    {
                        @for category in categories {
                            @let value = category.id.to_string();
                            (radio_option(
                                "category",
                                &format!("category-{value}"),
                                &value,
                                category.name.as_ref(),
                                form.category.trim() == value,
                            ))
                        }
                    }
                }

                (field_error(errors.category.as_deref()))
            }

            div class="flex gap-4"
            {
                button type="submit" class=(BUTTON_PRIMARY_STYLE) { (submit_label) }

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

fn radio_option(name: &str, id: &str, value: &str, label: &str, checked: bool) -> Markup {
    html! {
        div class="flex items-center gap-3"
        {
            input
                name=(name)
                id=(id)
                type="radio"
                value=(value)
                checked[checked]
                required
                class=(FORM_RADIO_INPUT_STYLE);

            label for=(id) class=(FORM_RADIO_LABEL_STYLE) { (label) }
        }
    }
}

fn field_error(message: Option<&str>) -> Markup {
    html! {
        @if let Some(message) = message {
            p class=(FORM_ERROR_STYLE) { (message) }
        }
    }
}

/// The response for a form that failed validation.
///
/// The form is always swapped into the transaction block, whichever element
/// the request came from.
pub fn invalid_form_response(form_markup: Markup) -> Response {
    (
        StatusCode::OK,
        HxRetarget(TRANSACTION_BLOCK_TARGET.to_owned()),
        Html(form_markup.into_string()),
    )
        .into_response()
}

/// The response for a successful change to the user's transactions.
///
/// Besides the message, the response triggers [TRANSACTIONS_CHANGED_EVENT] so
/// that the transaction list reloads.
pub fn success_response(message: &str) -> Response {
    let content = html! {
        p class="p-4 text-green-800 bg-green-50 rounded-lg dark:bg-gray-800 dark:text-green-400"
        {
            (message)
        }
    };

    (
        StatusCode::OK,
        [(HX_TRIGGER, TRANSACTIONS_CHANGED_EVENT)],
        Html(transaction_block(content).into_string()),
    )
        .into_response()
}
