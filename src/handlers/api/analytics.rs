use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::ApiResult;
use crate::{
    db::models::{Notification, PerformanceSummary},
    extractors::{AdminUser, ApiUser, StaffUser},
    rejections::{AppError, ResultExt},
    services::analytics::{StudentDashboard, SystemReport, TeacherDashboard},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/my-stats/", get(my_stats))
        .route("/system-report/", get(system_report))
        .route("/student-report/{id}/", get(student_report))
        .route("/teacher-dashboard/", get(teacher_dashboard))
        .route("/student-dashboard/", get(student_dashboard))
        .route("/notifications/", get(notifications))
        .route("/notifications/{id}/read/", post(mark_read))
}

async fn my_stats(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<PerformanceSummary>> {
    let summary = state
        .analytics
        .my_stats(&user)
        .await
        .reject("could not compute stats")?;
    Ok(Json(summary))
}

async fn system_report(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<SystemReport>> {
    let report = state
        .analytics
        .system_report()
        .await
        .reject("could not build system report")?;
    Ok(Json(report))
}

async fn student_report(
    StaffUser(_): StaffUser,
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
) -> ApiResult<Json<PerformanceSummary>> {
    let summary = state
        .analytics
        .student_report(student_id)
        .await
        .reject("could not build student report")??;
    Ok(Json(summary))
}

async fn teacher_dashboard(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
) -> ApiResult<Json<TeacherDashboard>> {
    let dashboard = state
        .analytics
        .teacher_dashboard(&user)
        .await
        .reject("could not load teacher dashboard")?;
    Ok(Json(dashboard))
}

async fn student_dashboard(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<StudentDashboard>> {
    if !user.is_student() {
        return Err(AppError::Forbidden.into());
    }
    let dashboard = state
        .analytics
        .student_dashboard(&user)
        .await
        .reject("could not load student dashboard")?;
    Ok(Json(dashboard))
}

async fn notifications(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = state
        .analytics
        .notifications(&user)
        .await
        .reject("could not list notifications")?;
    Ok(Json(notifications))
}

async fn mark_read(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .analytics
        .mark_read(&user, notification_id)
        .await
        .reject("could not mark notification")??;
    Ok(StatusCode::NO_CONTENT)
}
