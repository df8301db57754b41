use axum::{
    extract::{Form, Query, State},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Router,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::{
    extractors::{AnyPage, Guarded, Viewer},
    gate,
    models::{Registration, Role},
    names,
    rejections::{AppError, ResultExt},
    utils, views, AppState,
};

use crate::views::homepage as homepage_views;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(homepage))
        .route(names::REGISTER_URL, get(register_page).post(register_post))
        .route(names::LOGIN_URL, get(login_page).post(login_post))
        .route(names::LOGOUT_URL, post(logout_post))
        .route(names::DASHBOARD_URL, get(dashboard))
}

async fn homepage(Viewer(user): Viewer) -> axum::response::Response {
    match user {
        Some(_) => Redirect::to(names::DASHBOARD_URL).into_response(),
        None => views::page("Cognitive learning", homepage_views::landing_page()).into_response(),
    }
}

/// Sends each role to its own dashboard. Unplaced students never get here.
async fn dashboard(guarded: Guarded<AnyPage>) -> Redirect {
    match guarded.user().role {
        Role::Student => Redirect::to(names::STUDENT_DASHBOARD_URL),
        Role::Teacher | Role::Admin => Redirect::to(names::TEACHER_DASHBOARD_URL),
    }
}

#[derive(Deserialize)]
struct NextQuery {
    next: Option<String>,
}

async fn login_page(
    Viewer(user): Viewer,
    Query(query): Query<NextQuery>,
) -> axum::response::Response {
    if user.is_some() {
        return Redirect::to(names::DASHBOARD_URL).into_response();
    }
    views::page(
        "Log in",
        homepage_views::login(homepage_views::LoginState::NoError, query.next.as_deref()),
    )
    .into_response()
}

#[derive(Deserialize)]
struct LoginPost {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    next: Option<String>,
}

async fn login_post(
    State(state): State<AppState>,
    Form(body): Form<LoginPost>,
) -> Result<axum::response::Response, AppError> {
    use crate::services::auth::LoginOutcome;

    let next = body.next.as_deref().filter(|n| !n.is_empty());
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Ok(views::page(
            "Log in",
            homepage_views::login(homepage_views::LoginState::EmptyFields, next),
        )
        .into_response());
    }

    let outcome = state
        .auth
        .login(&body.username, &body.password)
        .await
        .reject("login failed")?;

    match outcome {
        LoginOutcome::Success(token) => {
            let max_age = state.auth.token_ttl_hours() * 3600;
            let cookie = utils::cookie(
                names::AUTH_COOKIE_NAME,
                &token,
                state.secure_cookies,
                max_age,
            )
            .reject("could not build auth cookie")?;
            let target = HeaderValue::from_str(&gate::post_login_target(next))
                .reject("could not build redirect")?;
            Ok((
                StatusCode::SEE_OTHER,
                [(SET_COOKIE, cookie), (LOCATION, target)],
                "",
            )
                .into_response())
        }
        LoginOutcome::InvalidCredentials => Ok((
            StatusCode::UNAUTHORIZED,
            views::page(
                "Log in",
                homepage_views::login(homepage_views::LoginState::IncorrectPassword, next),
            ),
        )
            .into_response()),
    }
}

async fn register_page(Viewer(user): Viewer) -> axum::response::Response {
    if user.is_some() {
        return Redirect::to(names::DASHBOARD_URL).into_response();
    }
    views::page(
        "Register",
        homepage_views::register(
            homepage_views::RegisterState::NoError,
            homepage_views::RegisterValues::default(),
        ),
    )
    .into_response()
}

async fn register_post(
    State(state): State<AppState>,
    Form(body): Form<Registration>,
) -> Result<axum::response::Response, AppError> {
    use crate::services::auth::RegisterOutcome;
    use homepage_views::RegisterState;

    let outcome = state
        .auth
        .register(&body)
        .await
        .reject("registration failed")?;

    let register_state = match outcome {
        RegisterOutcome::Created(user_id) => {
            tracing::info!("registered user {user_id}");
            return Ok(Redirect::to(names::LOGIN_URL).into_response());
        }
        RegisterOutcome::EmptyFields => RegisterState::EmptyFields,
        RegisterOutcome::UsernameTaken => RegisterState::UsernameTaken,
        RegisterOutcome::WeakPassword => RegisterState::WeakPassword,
        RegisterOutcome::InvalidRole => RegisterState::InvalidRole,
    };

    let values = homepage_views::RegisterValues {
        username: &body.username,
        email: &body.email,
        first_name: &body.first_name,
        last_name: &body.last_name,
        role: body.role.as_deref().unwrap_or_default(),
    };
    Ok((
        StatusCode::BAD_REQUEST,
        views::page("Register", homepage_views::register(register_state, values)),
    )
        .into_response())
}

async fn logout_post(
    jar: CookieJar,
    State(state): State<AppState>,
) -> Result<axum::response::Response, AppError> {
    if let Some(token) = jar.get(names::AUTH_COOKIE_NAME).map(|c| c.value().to_string()) {
        if let Err(e) = state.auth.logout(&token).await {
            tracing::warn!("could not delete auth token on logout: {e:?}");
        }
    }

    let cleared =
        utils::expired_cookie(names::AUTH_COOKIE_NAME).reject("could not build clear cookie")?;
    Ok((
        StatusCode::SEE_OTHER,
        [
            (SET_COOKIE, cleared),
            (LOCATION, HeaderValue::from_static(names::LOGIN_URL)),
        ],
        "",
    )
        .into_response())
}
