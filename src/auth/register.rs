//! The registration page for creating a user account.
use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    app_state::create_cookie_key,
    auth::{
        DEFAULT_COOKIE_DURATION, NewUser, PasswordHash, Username, ValidatedPassword, create_user,
        set_auth_cookie,
    },
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_ERROR_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        LINK_STYLE, base, loading_spinner, log_in_register, password_input, text_input,
    },
    internal_server_error::get_internal_server_error_redirect,
};

/// The minimum number of characters the password should have to be considered valid on the client side (server-side validation is done on top of this validation).
const PASSWORD_INPUT_MIN_LENGTH: u8 = 14;

fn confirm_password_input(min_length: u8, error_message: Option<&str>) -> Markup {
    html! {
        div
        {
            label
                for="confirm-password"
                class=(FORM_LABEL_STYLE)
            {
                "Confirm Password"
            }

            input
                type="password"
                name="confirm_password"
                id="confirm-password"
                placeholder="••••••••"
                class=(FORM_TEXT_INPUT_STYLE)
                required
                minlength=(min_length)
                autofocus[error_message.is_some()]
            ;

            @if let Some(error_message) = error_message
            {
                p class=(FORM_ERROR_STYLE) { (error_message) }
            }
        }

    }
}

/// Error messages for the individual fields of the registration form.
#[derive(Debug, Default)]
struct RegistrationErrors {
    username: Option<String>,
    password: Option<String>,
    confirm_password: Option<String>,
}

fn registration_form(form: &RegisterForm, errors: &RegistrationErrors) -> Markup {
    html! {
        form
            hx-post=(endpoints::USERS)
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            (text_input("username", "Username", &form.username, true, errors.username.as_deref()))
            (text_input("first_name", "First Name", &form.first_name, false, None))
            (text_input("last_name", "Last Name", &form.last_name, false, None))
            (password_input(&form.password, PASSWORD_INPUT_MIN_LENGTH, errors.password.as_deref()))
            (confirm_password_input(PASSWORD_INPUT_MIN_LENGTH, errors.confirm_password.as_deref()))

            button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Create Account"
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Already have an account? "

                a href=(endpoints::LOG_IN_VIEW) tabindex="0" class=(LINK_STYLE)
                {
                  "Log in here"
                }
            }
        }
    }
}

/// Display the registration page.
pub async fn get_register_page() -> Response {
    let registration_form = registration_form(&RegisterForm::default(), &RegistrationErrors::default());
    let content = log_in_register("Create Account", &registration_form);
    base("Register", &[], &content).into_response()
}

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl RegistrationState {
    /// Create the cookie key from a string and set the default cookie duration.
    pub fn new(cookie_secret: &str, db_connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            db_connection,
        }
    }
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegistrationState> for Key {
    fn from_ref(state: &RegistrationState) -> Self {
        state.cookie_key.clone()
    }
}

/// The data entered in the registration form.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
}

/// Create a user from the registration form, log them in and send them to the transactions page.
///
/// Invalid input is reported next to the offending field in the returned form.
pub async fn register_user(
    State(state): State<RegistrationState>,
    jar: PrivateCookieJar,
    Form(user_data): Form<RegisterForm>,
) -> Response {
    let username = match Username::new(&user_data.username) {
        Ok(username) => username,
        Err(error) => {
            let errors = RegistrationErrors {
                username: Some(error.to_string()),
                ..Default::default()
            };
            return registration_form(&user_data, &errors).into_response();
        }
    };

    let user_inputs = [
        username.as_ref(),
        user_data.first_name.as_str(),
        user_data.last_name.as_str(),
    ];
    let validated_password = match ValidatedPassword::new(&user_data.password, &user_inputs) {
        Ok(password) => password,
        Err(error) => {
            let errors = RegistrationErrors {
                password: Some(error.to_string()),
                ..Default::default()
            };
            return registration_form(&user_data, &errors).into_response();
        }
    };

    if user_data.password != user_data.confirm_password {
        let errors = RegistrationErrors {
            confirm_password: Some("Passwords do not match".to_owned()),
            ..Default::default()
        };
        return registration_form(&user_data, &errors).into_response();
    }

    let password_hash = match PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("an error occurred while hashing a password: {e}");

            return get_internal_server_error_redirect();
        }
    };

    let new_user = NewUser {
        username,
        first_name: user_data.first_name.trim().to_owned(),
        last_name: user_data.last_name.trim().to_owned(),
        password_hash,
    };

    let created_user = match state.db_connection.lock() {
        Ok(connection) => create_user(new_user, &connection),
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return get_internal_server_error_redirect();
        }
    };

    let user = match created_user {
        Ok(user) => user,
        Err(Error::DuplicateUsername) => {
            let errors = RegistrationErrors {
                username: Some("A user with that username already exists.".to_owned()),
                ..Default::default()
            };
            return registration_form(&user_data, &errors).into_response();
        }
        Err(e) => {
            tracing::error!("An unhandled error occurred while inserting a new user: {e}");
            return get_internal_server_error_redirect();
        }
    };

    tracing::info!("Registered user {} with ID {}", user.username, user.id);

    match set_auth_cookie(jar, user.id, state.cookie_duration) {
        Ok(jar) => (
            StatusCode::SEE_OTHER,
            HxRedirect(endpoints::TRANSACTIONS_VIEW.to_owned()),
            jar,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("An error occurred while setting the auth cookie: {e}");

            get_internal_server_error_redirect()
        }
    }
}


#[cfg(test)]
mod register_user_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Form, Router, extract::State, http::StatusCode, routing::post};
    use axum_extra::extract::PrivateCookieJar;
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{
        auth::{
            COOKIE_TOKEN, NewUser, PasswordHash, Username, create_user, get_user_by_username,
        },
        db::initialize,
        endpoints,
        test_utils::parse_html_fragment,
    };

    use super::{RegisterForm, RegistrationState, register_user};

    const STRONG_PASSWORD: &str = "iamtestingwhethericancreateanewuser";

    fn get_test_state() -> RegistrationState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");

        RegistrationState::new("42", Arc::new(Mutex::new(connection)))
    }

    fn register_form(username: &str, password: &str, confirm_password: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_owned(),
            first_name: "Alice".to_owned(),
            last_name: "Smith".to_owned(),
            password: password.to_owned(),
            confirm_password: confirm_password.to_owned(),
        }
    }

    async fn get_error_messages(response: axum::response::Response) -> Vec<String> {
        let fragment = parse_html_fragment(response).await;
        let p_selector = scraper::Selector::parse("p.text-red-500").unwrap();

        fragment
            .select(&p_selector)
            .map(|p| p.text().collect::<String>().to_lowercase())
            .collect()
    }

    #[tokio::test]
    async fn create_user_succeeds() {
        let state = get_test_state();
        let app = Router::new()
            .route(endpoints::USERS, post(register_user))
            .with_state(state.clone());

        let server = TestServer::try_new(app).expect("Could not create test server.");

        let response = server
            .post(endpoints::USERS)
            .form(&register_form("alice", STRONG_PASSWORD, STRONG_PASSWORD))
            .await;

        response.assert_status_see_other();
        assert_eq!(response.header("hx-redirect"), endpoints::TRANSACTIONS_VIEW);
        response.cookie(COOKIE_TOKEN);

        let connection = state.db_connection.lock().unwrap();
        let user = get_user_by_username("alice", &connection).unwrap();
        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.last_name, "Smith");
        assert!(user.password_hash.verify(STRONG_PASSWORD).unwrap());
    }

    #[tokio::test]
    async fn create_user_fails_with_existing_username() {
        let state = get_test_state();
        create_user(
            NewUser {
                username: Username::new_unchecked("alice"),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: PasswordHash::from_raw_password("foobarbazquxgobbledygook", 4)
                    .unwrap(),
            },
            &state.db_connection.lock().unwrap(),
        )
        .expect("Could not create test user");

        let response = register_user(
            State(state.clone()),
            PrivateCookieJar::new(state.cookie_key),
            Form(register_form("alice", STRONG_PASSWORD, STRONG_PASSWORD)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let errors = get_error_messages(response).await;
        assert_eq!(errors.len(), 1, "want 1 error, got {errors:?}");
        assert!(
            errors[0].contains("already exists"),
            "'{}' does not contain the text 'already exists'",
            errors[0]
        );
    }

    #[tokio::test]
    async fn create_user_fails_with_invalid_username() {
        let state = get_test_state();

        let response = register_user(
            State(state.clone()),
            PrivateCookieJar::new(state.cookie_key),
            Form(register_form("alice smith", STRONG_PASSWORD, STRONG_PASSWORD)),
        )
        .await;

        let errors = get_error_messages(response).await;
        assert_eq!(errors.len(), 1, "want 1 error, got {errors:?}");
        assert!(errors[0].contains("username may only contain"));
    }

    #[tokio::test]
    async fn create_user_fails_when_password_is_weak() {
        let state = get_test_state();

        let response = register_user(
            State(state.clone()),
            PrivateCookieJar::new(state.cookie_key),
            Form(register_form("alice", "foo", "foo")),
        )
        .await;

        let errors = get_error_messages(response).await;
        assert_eq!(errors.len(), 1, "want 1 error, got {errors:?}");
        assert!(
            errors[0].contains("password is too weak"),
            "'{}' does not contain the text 'password is too weak'",
            errors[0]
        );
    }

    #[tokio::test]
    async fn create_user_fails_when_passwords_do_not_match() {
        let state = get_test_state();

        let response = register_user(
            State(state.clone()),
            PrivateCookieJar::new(state.cookie_key),
            Form(register_form(
                "alice",
                STRONG_PASSWORD,
                "thisisadifferentbutstrongpassword",
            )),
        )
        .await;

        let errors = get_error_messages(response).await;
        assert_eq!(errors, vec!["passwords do not match".to_owned()]);
    }

    #[tokio::test]
    async fn create_user_fails_with_missing_fields() {
        let app = Router::new()
            .route(endpoints::USERS, post(register_user))
            .with_state(get_test_state());
        let server = TestServer::try_new(app).expect("Could not create test server.");

        server
            .post(endpoints::USERS)
            .form(&[("username", "alice")])
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }
}
