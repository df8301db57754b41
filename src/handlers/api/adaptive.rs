use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use super::ApiResult;
use crate::{
    db::models::{Content, ContentProgress, LearningPath, Recommendation},
    extractors::{ApiJson, ApiUser, StaffUser},
    handlers::content_from_multipart,
    models::{ContentUpdate, NewContent},
    rejections::ResultExt,
    services::adaptive::{AdaptiveDashboard, ProgressUpdate},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/contents/", get(contents))
        .route("/content/{id}/", get(content_detail))
        .route("/content/{id}/file", get(content_file))
        .route("/content/{id}/progress/", post(update_progress))
        .route("/progress/", get(progress))
        .route("/recommended/", get(recommended))
        .route("/recommendations/", get(recommendations))
        .route("/recommendations/{id}/click/", post(click_recommendation))
        .route("/learning-path/", get(learning_path))
        .route("/learning-path/reset/", post(reset_learning_path))
        .route("/dashboard/", get(dashboard))
        .route("/teacher/contents/", get(teacher_contents))
        .route("/teacher/content/create/", post(create_content))
        .route("/teacher/content/{id}/update/", put(update_content))
        .route("/teacher/content/{id}/delete/", delete(delete_content))
}

// ---------------------------------------------------------------------------
// Content for learners
// ---------------------------------------------------------------------------

async fn contents(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Content>>> {
    let contents = state
        .adaptive
        .contents_for(&user)
        .await
        .reject("could not list contents")?;
    Ok(Json(contents))
}

async fn content_detail(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<Content>> {
    let content = state
        .adaptive
        .content_detail(&user, content_id)
        .await
        .reject("could not load content")??;
    Ok(Json(content))
}

async fn content_file(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let file = state
        .adaptive
        .content_file(&user, content_id)
        .await
        .reject("could not load content file")??;

    let content_type = HeaderValue::from_str(&file.media_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        file.name.replace(['"', '\\'], "_")
    ))
    .reject("could not build content disposition")?;

    Ok((
        [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)],
        file.bytes,
    ))
}

#[derive(Deserialize)]
struct ProgressBody {
    #[serde(default = "full_progress")]
    progress_percent: f64,
}

fn full_progress() -> f64 {
    100.0
}

/// The body is optional; an empty one means the content was finished.
async fn update_progress(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<ProgressUpdate>> {
    let percent = if body.is_empty() {
        full_progress()
    } else {
        serde_json::from_slice::<ProgressBody>(&body)
            .reject_input("invalid progress body")?
            .progress_percent
    };

    let update = state
        .adaptive
        .record_progress(&user, content_id, percent)
        .await
        .reject("could not record progress")??;
    Ok(Json(update))
}

async fn progress(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ContentProgress>>> {
    let progress = state
        .adaptive
        .progress(&user)
        .await
        .reject("could not list progress")?;
    Ok(Json(progress))
}

// ---------------------------------------------------------------------------
// Recommendations and learning path
// ---------------------------------------------------------------------------

async fn recommended(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Recommendation>>> {
    let recommendations = state
        .adaptive
        .regenerate_recommendations(&user)
        .await
        .reject("could not regenerate recommendations")??;
    Ok(Json(recommendations))
}

async fn recommendations(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Recommendation>>> {
    let recommendations = state
        .adaptive
        .recommendations(&user)
        .await
        .reject("could not list recommendations")?;
    Ok(Json(recommendations))
}

async fn click_recommendation(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    Path(recommendation_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .adaptive
        .click_recommendation(&user, recommendation_id)
        .await
        .reject("could not mark recommendation")??;
    Ok(StatusCode::NO_CONTENT)
}

async fn learning_path(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Option<LearningPath>>> {
    let path = state
        .adaptive
        .learning_path(&user)
        .await
        .reject("could not load learning path")?;
    Ok(Json(path))
}

async fn reset_learning_path(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<LearningPath>> {
    let path = state
        .adaptive
        .reset_learning_path(&user)
        .await
        .reject("could not reset learning path")?;
    Ok(Json(path))
}

async fn dashboard(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<AdaptiveDashboard>> {
    let dashboard = state
        .adaptive
        .dashboard(&user)
        .await
        .reject("could not load dashboard")?;
    Ok(Json(dashboard))
}

// ---------------------------------------------------------------------------
// Authoring
// ---------------------------------------------------------------------------

async fn teacher_contents(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Content>>> {
    let contents = state
        .adaptive
        .authored_contents(&user)
        .await
        .reject("could not list contents")?;
    Ok(Json(contents))
}

/// Accepts a JSON body, or a multipart form when a file comes along.
async fn create_content(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<impl IntoResponse> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let (content, file) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .reject_input("invalid multipart body")?;
        content_from_multipart(multipart).await?
    } else {
        let ApiJson(content) = ApiJson::<NewContent>::from_request(request, &state).await?;
        (content, None)
    };

    let created = state
        .adaptive
        .create_content(&user, &content, file.as_ref())
        .await
        .reject("could not create content")??;
    tracing::info!("user_id={} created content_id={}", user.id, created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_content(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
    ApiJson(update): ApiJson<ContentUpdate>,
) -> ApiResult<Json<Content>> {
    let content = state
        .adaptive
        .update_content(&user, content_id, &update, None)
        .await
        .reject("could not update content")??;
    Ok(Json(content))
}

async fn delete_content(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .adaptive
        .delete_content(&user, content_id)
        .await
        .reject("could not delete content")??;
    tracing::info!("user_id={} deleted content_id={content_id}", user.id);
    Ok(StatusCode::NO_CONTENT)
}
