use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::{get, post},
    Router,
};

use crate::{
    extractors::{AnyPage, Guarded},
    names,
    rejections::{AppError, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/content/{id}", get(content_page))
        .route("/content/{id}/complete", post(complete_post))
}

async fn content_page(
    Guarded(user, _): Guarded<AnyPage>,
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Result<maud::Markup, AppError> {
    let content = state
        .adaptive
        .content_detail(&user, content_id)
        .await
        .reject("could not load content")??;

    let completed = if user.is_student() {
        state
            .adaptive
            .progress(&user)
            .await
            .reject("could not load progress")?
            .iter()
            .any(|p| p.content == content_id && p.is_completed)
    } else {
        false
    };

    Ok(views::page_with_user(
        &content.title,
        &user,
        views::content::content_detail(&content, user.is_student(), completed),
    ))
}

async fn complete_post(
    Guarded(user, _): Guarded<AnyPage>,
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Result<Redirect, AppError> {
    let update = state
        .adaptive
        .record_progress(&user, content_id, 100.0)
        .await
        .reject("could not record progress")??;
    tracing::info!(
        "user_id={} completed content_id={content_id}: {}",
        user.id,
        update.is_completed
    );
    Ok(Redirect::to(&names::content_url(content_id)))
}
