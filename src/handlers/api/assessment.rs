use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;

use super::ApiResult;
use crate::{
    db::models::{CognitiveTest, Question, TestResult, TestSession},
    extractors::{ApiJson, ApiUser, StaffUser},
    models::{AnswerInput, GradeSubmission, NewTest, QuestionInput, TestUpdate},
    rejections::ResultExt,
    services::assessment::{Finished, SessionDetail, TestDetail},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/teacher/tests/all/", get(all_tests))
        .route("/teacher/tests/create/", post(create_test))
        .route("/teacher/tests/placement/create/", post(create_placement_test))
        .route("/teacher/tests/update/{id}/", put(update_test))
        .route("/teacher/tests/delete/{id}/", delete(delete_test))
        .route("/content/{content_id}/test/create/", post(content_test))
        .route("/teacher/tests/{id}/questions/list/", get(questions))
        .route("/teacher/tests/{id}/questions/", post(add_question))
        .route("/teacher/questions/{id}/update/", put(update_question))
        .route("/teacher/questions/{id}/delete/", delete(delete_question))
        .route("/tests/", get(tests))
        .route("/tests/{id}/", get(test_detail))
        .route("/tests/{id}/start/", post(start))
        .route(
            "/sessions/{session_id}/questions/{question_id}/answer/",
            post(submit_answer),
        )
        .route("/sessions/{session_id}/finish/", post(finish))
        .route("/teacher/reviews/pending/", get(pending_reviews))
        .route("/teacher/sessions/{session_id}/", get(session_detail))
        .route("/teacher/sessions/{session_id}/grade/", post(grade))
        .route("/results/{session_id}/", get(result))
        .route("/my-history/", get(history))
}

// ---------------------------------------------------------------------------
// Test management
// ---------------------------------------------------------------------------

async fn all_tests(
    StaffUser(_): StaffUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CognitiveTest>>> {
    let tests = state
        .assessment
        .all_tests()
        .await
        .reject("could not list tests")?;
    Ok(Json(tests))
}

async fn create_test(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    ApiJson(test): ApiJson<NewTest>,
) -> ApiResult<impl IntoResponse> {
    let created = state
        .assessment
        .create_test(&user, test, false)
        .await
        .reject("could not create test")??;
    tracing::info!("user_id={} created test_id={}", user.id, created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

async fn create_placement_test(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    ApiJson(test): ApiJson<NewTest>,
) -> ApiResult<impl IntoResponse> {
    let created = state
        .assessment
        .create_test(&user, test, true)
        .await
        .reject("could not create placement test")??;
    tracing::info!("user_id={} created placement test_id={}", user.id, created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_test(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
    ApiJson(update): ApiJson<TestUpdate>,
) -> ApiResult<Json<CognitiveTest>> {
    let test = state
        .assessment
        .update_test(&user, test_id, &update)
        .await
        .reject("could not update test")??;
    Ok(Json(test))
}

async fn delete_test(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .assessment
        .delete_test(&user, test_id)
        .await
        .reject("could not delete test")??;
    tracing::info!("user_id={} deleted test_id={test_id}", user.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn content_test(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let content_test = state
        .assessment
        .content_test(&user, content_id)
        .await
        .reject("could not create content test")??;
    let status = if content_test.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(content_test)))
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

async fn questions(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> ApiResult<Json<Vec<Question>>> {
    let questions = state
        .assessment
        .questions(&user, test_id)
        .await
        .reject("could not list questions")??;
    Ok(Json(questions))
}

async fn add_question(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
    ApiJson(question): ApiJson<QuestionInput>,
) -> ApiResult<impl IntoResponse> {
    let question = state
        .assessment
        .add_question(&user, test_id, &question)
        .await
        .reject("could not add question")??;
    Ok((StatusCode::CREATED, Json(question)))
}

async fn update_question(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    ApiJson(question): ApiJson<QuestionInput>,
) -> ApiResult<Json<Question>> {
    let question = state
        .assessment
        .update_question(&user, question_id, &question)
        .await
        .reject("could not update question")??;
    Ok(Json(question))
}

async fn delete_question(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .assessment
        .delete_question(&user, question_id)
        .await
        .reject("could not delete question")??;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Taking tests
// ---------------------------------------------------------------------------

async fn tests(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CognitiveTest>>> {
    let tests = state
        .assessment
        .tests_for(&user)
        .await
        .reject("could not list tests")?;
    Ok(Json(tests))
}

async fn test_detail(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> ApiResult<Json<TestDetail>> {
    let detail = state
        .assessment
        .test_detail(&user, test_id)
        .await
        .reject("could not load test")??;
    Ok(Json(detail))
}

async fn start(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let started = state
        .assessment
        .start(&user, test_id)
        .await
        .reject("could not start test")??;
    let status = if started.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(started.session)))
}

async fn submit_answer(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    Path((session_id, question_id)): Path<(i64, i64)>,
    ApiJson(answer): ApiJson<AnswerInput>,
) -> ApiResult<Json<serde_json::Value>> {
    let answer_id = state
        .assessment
        .submit_answer(&user, session_id, question_id, &answer)
        .await
        .reject("could not save answer")??;
    Ok(Json(json!({ "answer_id": answer_id })))
}

async fn finish(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<Finished>> {
    let finished = state
        .assessment
        .finish(&user, session_id)
        .await
        .reject("could not finish session")??;
    Ok(Json(finished))
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

async fn pending_reviews(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TestSession>>> {
    let sessions = state
        .assessment
        .pending_reviews(&user)
        .await
        .reject("could not list pending reviews")?;
    Ok(Json(sessions))
}

async fn session_detail(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<SessionDetail>> {
    let detail = state
        .assessment
        .session_detail(&user, session_id)
        .await
        .reject("could not load session")??;
    Ok(Json(detail))
}

async fn grade(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    ApiJson(submission): ApiJson<GradeSubmission>,
) -> ApiResult<Json<Finished>> {
    let finished = state
        .assessment
        .grade(&user, session_id, &submission)
        .await
        .reject("could not grade session")??;
    tracing::info!(
        "user_id={} graded session_id={session_id}: {:.2}",
        user.id,
        finished.total_score
    );
    Ok(Json(finished))
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

async fn result(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<TestResult>> {
    let result = state
        .assessment
        .result(&user, session_id)
        .await
        .reject("could not load result")??;
    Ok(Json(result))
}

async fn history(
    ApiUser(user): ApiUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TestSession>>> {
    let sessions = state
        .assessment
        .history(&user)
        .await
        .reject("could not load history")?;
    Ok(Json(sessions))
}
