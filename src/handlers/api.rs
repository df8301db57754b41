//! JSON endpoints, nested under `/api`.

pub mod accounts;
pub mod adaptive;
pub mod analytics;
pub mod assessment;

use axum::Router;

use crate::{rejections::ApiError, AppState};

pub type ApiResult<T> = Result<T, ApiError>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/accounts", accounts::routes())
        .nest("/assessment", assessment::routes())
        .nest("/adaptive-learning", adaptive::routes())
        .nest("/analytics", analytics::routes())
}
