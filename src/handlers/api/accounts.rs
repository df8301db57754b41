use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::ApiResult;
use crate::{
    db::models::User,
    extractors::{ApiJson, ApiUser, AuthToken},
    models::{Credentials, PasswordChange, ProfileUpdate, Registration},
    rejections::{ApiError, AppError, ResultExt},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login/", post(login))
        .route("/register/", post(register))
        .route("/logout/", post(logout))
        .route("/profile/", get(profile).patch(update_profile))
        .route("/change-password/", post(change_password))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<Json<serde_json::Value>> {
    use crate::services::auth::LoginOutcome;

    match state
        .auth
        .login(&credentials.username, &credentials.password)
        .await
        .reject("login failed")?
    {
        LoginOutcome::Success(token) => Ok(Json(json!({ "access": token }))),
        LoginOutcome::InvalidCredentials => Err(ApiError(AppError::Unauthorized)),
    }
}

async fn register(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<Registration>,
) -> ApiResult<impl IntoResponse> {
    use crate::services::auth::RegisterOutcome;

    let user_id = match state
        .auth
        .register(&registration)
        .await
        .reject("registration failed")?
    {
        RegisterOutcome::Created(user_id) => user_id,
        RegisterOutcome::EmptyFields => {
            return Err(AppError::Input("username and password are required").into())
        }
        RegisterOutcome::UsernameTaken => {
            return Err(AppError::Input("a user with that username already exists").into())
        }
        RegisterOutcome::WeakPassword => {
            return Err(AppError::Input("password must be at least 8 characters long").into())
        }
        RegisterOutcome::InvalidRole => {
            return Err(AppError::Input("role must be student or teacher").into())
        }
    };

    let user = state
        .db
        .find_user(user_id)
        .await
        .reject("could not load new user")?
        .ok_or(AppError::Internal("new user missing"))?;
    tracing::info!("registered user_id={user_id} via api");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn logout(
    ApiUser(user): ApiUser,
    AuthToken(token): AuthToken,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    if let Some(token) = token {
        state
            .auth
            .logout(&token)
            .await
            .reject("could not delete token")?;
    }
    tracing::info!("user_id={} logged out", user.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn profile(ApiUser(user): ApiUser) -> Json<User> {
    Json(user)
}

async fn update_profile(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<User>> {
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
    Ok(Json(user))
}

async fn change_password(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    ApiJson(change): ApiJson<PasswordChange>,
) -> ApiResult<Json<serde_json::Value>> {
    use crate::services::auth::ChangePasswordOutcome;

    match state
        .auth
        .change_password(user.id, &change.current_password, &change.new_password)
        .await
        .reject("could not change password")?
    {
        ChangePasswordOutcome::Success => Ok(Json(json!({ "detail": "Password changed." }))),
        ChangePasswordOutcome::EmptyFields => {
            Err(AppError::Input("both passwords are required").into())
        }
        ChangePasswordOutcome::WeakPassword => {
            Err(AppError::Input("new password must be at least 8 characters long").into())
        }
        ChangePasswordOutcome::IncorrectPassword => {
            Err(AppError::Input("current password is incorrect").into())
        }
    }
}
