use std::marker::PhantomData;

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::de::DeserializeOwned;

use crate::{
    db::models::User,
    gate::{self, Policy},
    models::Role,
    names,
    rejections::{ApiError, AppError, ResultExt},
    AppState,
};

/// The bearer token of the request: `Authorization: Bearer` first, then the auth cookie.
pub fn request_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(&parts.headers)
        .get(names::AUTH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Whoever is making the request, if anyone.
pub struct Viewer(pub Option<User>);

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = request_token(parts) else {
            return Ok(Viewer(None));
        };
        let user = state
            .auth
            .user_for_token(&token)
            .await
            .reject("could not resolve auth token")?;
        Ok(Viewer(user))
    }
}

// ---------------------------------------------------------------------------
// API extractors
// ---------------------------------------------------------------------------

/// An authenticated API caller. Missing or unknown tokens get a 401.
pub struct ApiUser(pub User);

impl FromRequestParts<AppState> for ApiUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Viewer(user) = Viewer::from_request_parts(parts, state).await?;
        user.map(ApiUser).ok_or(ApiError(AppError::Unauthorized))
    }
}

/// The raw token sent with the request, for endpoints that act on the token itself.
pub struct AuthToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for AuthToken {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AuthToken(request_token(parts)))
    }
}

/// A JSON body whose parse errors come back as `{"detail": ...}`.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                tracing::warn!("rejected JSON body: {}", rejection.body_text());
                Err(ApiError(AppError::Input("invalid JSON body")))
            }
        }
    }
}

/// A teacher or admin API caller.
pub struct StaffUser(pub User);

impl FromRequestParts<AppState> for StaffUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ApiUser(user) = ApiUser::from_request_parts(parts, state).await?;
        if !user.role.is_staff() {
            return Err(ApiError(AppError::Forbidden));
        }
        Ok(StaffUser(user))
    }
}

pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ApiUser(user) = ApiUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError(AppError::Forbidden));
        }
        Ok(AdminUser(user))
    }
}

// ---------------------------------------------------------------------------
// Page guard
// ---------------------------------------------------------------------------

pub trait PagePolicy {
    const POLICY: Policy;
}

pub struct AnyPage;
pub struct ProfilePage;
pub struct StudentPage;
pub struct PlacementPage;
pub struct TeacherPage;

impl PagePolicy for AnyPage {
    const POLICY: Policy = Policy::ANY;
}

impl PagePolicy for ProfilePage {
    const POLICY: Policy = Policy::ANY_UNPLACED;
}

impl PagePolicy for StudentPage {
    const POLICY: Policy = Policy::STUDENT;
}

impl PagePolicy for PlacementPage {
    const POLICY: Policy = Policy::PLACEMENT;
}

impl PagePolicy for TeacherPage {
    const POLICY: Policy = Policy::TEACHER;
}

/// A page viewer that passed the access gate for policy `P`.
/// Anyone else is redirected before the handler runs.
pub struct Guarded<P: PagePolicy>(pub User, pub PhantomData<P>);

impl<P: PagePolicy> Guarded<P> {
    pub fn user(&self) -> &User {
        &self.0
    }
}

impl<P: PagePolicy + Send + Sync> FromRequestParts<AppState> for Guarded<P> {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Viewer(user) = Viewer::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| parts.uri.path());

        match gate::guard(user, &P::POLICY, path) {
            Ok(user) => Ok(Guarded(user, PhantomData)),
            Err(target) => {
                tracing::debug!("gate redirect: {path} -> {target}");
                Err(Redirect::to(&target).into_response())
            }
        }
    }
}
