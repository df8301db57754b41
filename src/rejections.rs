use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use maud::html;

use crate::{services::Refusal, views};

/// Errors returned by handlers. Pages render them as an HTML error page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    Unauthorized,
    Forbidden,
    NotFound,
    Input(&'static str),
    Internal(&'static str),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Input(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn detail(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "Authentication credentials were not provided or are invalid.",
            AppError::Forbidden => "You do not have permission to perform this action.",
            AppError::NotFound => "Not found.",
            AppError::Input(msg) => msg,
            AppError::Internal(_) => "Internal server error.",
        }
    }
}

impl From<Refusal> for AppError {
    fn from(refusal: Refusal) -> Self {
        match refusal {
            Refusal::NotFound => AppError::NotFound,
            Refusal::Forbidden => AppError::Forbidden,
            Refusal::Invalid(msg) => AppError::Input(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = views::page(
            status.canonical_reason().unwrap_or("Error"),
            html! {
                h1 { (status.as_u16()) " " (status.canonical_reason().unwrap_or("Error")) }
                p { (self.detail()) }
                a href="/" { "Back to start" }
            },
        );
        (status, body).into_response()
    }
}

/// The same errors for the JSON API: `{"detail": "..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<Refusal> for ApiError {
    fn from(refusal: Refusal) -> Self {
        ApiError(refusal.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.0.status(),
            Json(serde_json::json!({ "detail": self.0.detail() })),
        )
            .into_response()
    }
}

pub trait ResultExt<T> {
    /// Log the error and turn it into an internal error.
    fn reject(self, msg: &'static str) -> Result<T, AppError>;

    /// Log the error and turn it into an input error.
    fn reject_input(self, msg: &'static str) -> Result<T, AppError>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for Result<T, E> {
    fn reject(self, msg: &'static str) -> Result<T, AppError> {
        self.map_err(|e| {
            tracing::error!("{msg}: {e:?}");
            AppError::Internal(msg)
        })
    }

    fn reject_input(self, msg: &'static str) -> Result<T, AppError> {
        self.map_err(|e| {
            tracing::error!("{msg}: {e:?}");
            AppError::Input(msg)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusals_map_to_statuses() {
        assert_eq!(AppError::from(Refusal::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(Refusal::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::from(Refusal::Invalid("bad")),
            AppError::Input("bad")
        );
    }

    #[test]
    fn internal_errors_hide_their_cause() {
        let failed: Result<(), &str> = Err("disk on fire");
        assert_eq!(
            failed.reject("could not save"),
            Err(AppError::Internal("could not save"))
        );
        assert_eq!(AppError::Internal("could not save").detail(), "Internal server error.");
    }
}
