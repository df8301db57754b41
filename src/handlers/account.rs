use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::{
    db::models::User,
    extractors::{Guarded, ProfilePage},
    models::ProfileUpdate,
    names,
    rejections::{AppError, ResultExt},
    views, AppState,
};

use crate::views::account::{self as account_views, ProfileState};

pub fn routes() -> Router<AppState> {
    Router::new().route(names::PROFILE_URL, get(profile_page).post(profile_post))
}

async fn render(
    state: &AppState,
    user: &User,
    profile_state: ProfileState,
) -> Result<maud::Markup, AppError> {
    let history = state
        .db
        .level_history(user.id)
        .await
        .reject("could not load level history")?;
    Ok(views::page_with_user(
        "Profile",
        user,
        account_views::profile_page(user, &history, profile_state),
    ))
}

async fn profile_page(
    Guarded(user, _): Guarded<ProfilePage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    render(&state, &user, ProfileState::NoError).await
}

/// Both forms on the profile page post here; `action` tells them apart.
#[derive(Deserialize)]
struct ProfilePost {
    action: String,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

async fn profile_post(
    Guarded(user, _): Guarded<ProfilePage>,
    State(state): State<AppState>,
    Form(body): Form<ProfilePost>,
) -> Result<axum::response::Response, AppError> {
    use crate::services::auth::ChangePasswordOutcome;

    match body.action.as_str() {
        "profile" => {
            let update = ProfileUpdate {
                first_name: body.first_name,
                last_name: body.last_name,
                email: body.email,
            };
            state
                .auth
                .update_profile(user.id, &update)
                .await
                .reject("could not update profile")?;
            let user = state
                .db
                .find_user(user.id)
                .await
                .reject("could not reload user")?
                .ok_or(AppError::NotFound)?;
            Ok(render(&state, &user, ProfileState::ProfileSaved)
                .await?
                .into_response())
        }
        "password" => {
            let outcome = state
                .auth
                .change_password(user.id, &body.current_password, &body.new_password)
                .await
                .reject("could not change password")?;
            let (status, profile_state) = match outcome {
                ChangePasswordOutcome::Success => (StatusCode::OK, ProfileState::PasswordChanged),
                ChangePasswordOutcome::EmptyFields => {
                    (StatusCode::BAD_REQUEST, ProfileState::EmptyFields)
                }
                ChangePasswordOutcome::WeakPassword => {
                    (StatusCode::BAD_REQUEST, ProfileState::WeakPassword)
                }
                ChangePasswordOutcome::IncorrectPassword => {
                    (StatusCode::BAD_REQUEST, ProfileState::IncorrectPassword)
                }
            };
            Ok((status, render(&state, &user, profile_state).await?).into_response())
        }
        _ => Err(AppError::Input("unknown profile action")),
    }
}
