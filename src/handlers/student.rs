use std::collections::HashMap;

use axum::{
    extract::{Form, Path, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Router,
};
use futures::future::try_join_all;

use crate::{
    db::models::User,
    extractors::{Guarded, PlacementPage, StudentPage},
    handlers::answers_from_form,
    names,
    rejections::{AppError, ResultExt},
    services::analytics,
    views, AppState,
};

use crate::views::student as student_views;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(names::STUDENT_DASHBOARD_URL, get(dashboard))
        .route(
            names::PLACEMENT_TEST_URL,
            get(placement_page).post(placement_post),
        )
        .route(names::STUDENT_TESTS_URL, get(tests_page))
        .route("/student/tests/{id}/take", get(take_page).post(take_post))
        .route("/student/results/{session_id}", get(result_page))
        .route(names::STUDENT_HISTORY_URL, get(history_page))
        .route(
            names::LEARNING_PATH_URL,
            get(learning_path_page).post(learning_path_reset),
        )
        .route(names::STUDENT_STATS_URL, get(stats_page))
        .route(
            names::RECOMMENDATIONS_URL,
            get(recommendations_page).post(recommendations_refresh),
        )
        .route(
            "/student/recommendations/{id}/open",
            post(recommendation_open),
        )
}

async fn dashboard(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let data = state
        .analytics
        .student_dashboard(&user)
        .await
        .reject("could not load dashboard")?;
    if let Err(e) = state
        .analytics
        .log_event(&user, "view_dashboard", &serde_json::json!({}))
        .await
    {
        tracing::warn!("failed to log dashboard view: {e}");
    }
    Ok(views::page_with_user(
        "Dashboard",
        &user,
        student_views::dashboard(&data),
    ))
}

/// Open (or resume) a session and render the attempt form posting to `action`.
async fn render_attempt(
    state: &AppState,
    user: &User,
    test_id: i64,
    action: &str,
) -> Result<axum::response::Response, AppError> {
    let started = state
        .assessment
        .start(user, test_id)
        .await
        .reject("could not start test")??;
    let detail = state
        .assessment
        .test_detail(user, test_id)
        .await
        .reject("could not load test")??;

    if started.created {
        tracing::info!(
            "user_id={} started session_id={} for test_id={test_id}",
            user.id,
            started.session.id
        );
    }

    Ok(views::page_with_user(
        &detail.test.title,
        user,
        student_views::take_test(&detail, &started.session, action),
    )
    .into_response())
}

/// Submit every answer on the attempt form, then finish the session once.
async fn submit_attempt(
    state: &AppState,
    user: &User,
    form: &HashMap<String, String>,
) -> Result<axum::response::Response, AppError> {
    let session_id: i64 = form
        .get("session_id")
        .ok_or(AppError::Input("missing session"))?
        .parse()
        .reject_input("invalid session id")?;
    let session = state
        .db
        .get_session(session_id)
        .await
        .reject("could not load session")?
        .filter(|s| s.user == user.id)
        .ok_or(AppError::NotFound)?;
    let detail = state
        .assessment
        .test_detail(user, session.test)
        .await
        .reject("could not load test")??;

    let answers = answers_from_form(form, &detail.questions);
    let submitted = try_join_all(answers.iter().map(|(question_id, answer)| {
        state
            .assessment
            .submit_answer(user, session_id, *question_id, answer)
    }))
    .await
    .reject("could not save answers")?;
    for (outcome, (question_id, _)) in submitted.iter().zip(&answers) {
        if let Err(refusal) = outcome {
            tracing::warn!("answer to question_id={question_id} refused: {refusal:?}");
        }
    }

    let finished = state
        .assessment
        .finish(user, session_id)
        .await
        .reject("could not finish test")??;
    tracing::info!(
        "user_id={} finished session_id={session_id}: {} ({:.2})",
        user.id,
        finished.status,
        finished.total_score
    );

    Ok(Redirect::to(&names::results_url(session_id)).into_response())
}

async fn placement_page(
    Guarded(user, _): Guarded<PlacementPage>,
    State(state): State<AppState>,
) -> Result<axum::response::Response, AppError> {
    if !user.needs_placement() {
        return Ok(Redirect::to(names::STUDENT_DASHBOARD_URL).into_response());
    }

    let tests = state
        .assessment
        .tests_for(&user)
        .await
        .reject("could not list placement tests")?;
    let Some(test) = tests.first() else {
        return Ok(views::page_with_user(
            "Placement test",
            &user,
            student_views::no_placement_test(),
        )
        .into_response());
    };

    render_attempt(&state, &user, test.id, names::PLACEMENT_TEST_URL).await
}

async fn placement_post(
    Guarded(user, _): Guarded<PlacementPage>,
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<axum::response::Response, AppError> {
    submit_attempt(&state, &user, &form).await
}

async fn tests_page(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let tests = state
        .assessment
        .tests_for(&user)
        .await
        .reject("could not list tests")?;
    Ok(views::page_with_user(
        "Tests",
        &user,
        student_views::tests_list(&tests, user.needs_placement()),
    ))
}

async fn take_page(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<axum::response::Response, AppError> {
    render_attempt(&state, &user, test_id, &names::take_test_url(test_id)).await
}

async fn take_post(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
    Path(_test_id): Path<i64>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<axum::response::Response, AppError> {
    submit_attempt(&state, &user, &form).await
}

async fn result_page(
    Guarded(user, _): Guarded<PlacementPage>,
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<maud::Markup, AppError> {
    let result = state
        .assessment
        .result(&user, session_id)
        .await
        .reject("could not load result")??;
    Ok(views::page_with_user(
        "Result",
        &user,
        student_views::result_page(&result),
    ))
}

async fn history_page(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let sessions = state
        .assessment
        .history(&user)
        .await
        .reject("could not load history")?;
    Ok(views::page_with_user(
        "History",
        &user,
        student_views::history(&sessions),
    ))
}

async fn learning_path_page(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let path = state
        .adaptive
        .learning_path(&user)
        .await
        .reject("could not load learning path")?;
    Ok(views::page_with_user(
        "Learning path",
        &user,
        student_views::learning_path(path.as_ref()),
    ))
}

async fn learning_path_reset(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let path = state
        .adaptive
        .reset_learning_path(&user)
        .await
        .reject("could not reset learning path")?;
    tracing::info!(
        "user_id={} reset learning path ({} items)",
        user.id,
        path.items.len()
    );
    Ok(Redirect::to(names::LEARNING_PATH_URL))
}

async fn stats_page(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let summary = state
        .analytics
        .my_stats(&user)
        .await
        .reject("could not compute stats")?;
    let notifications = state
        .analytics
        .notifications(&user)
        .await
        .reject("could not load notifications")?;
    let level = user.level();
    Ok(views::page_with_user(
        "My stats",
        &user,
        student_views::stats(&summary, level, analytics::rank(level), &notifications),
    ))
}

async fn recommendations_page(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let recommendations = state
        .adaptive
        .recommendations(&user)
        .await
        .reject("could not load recommendations")?;
    Ok(views::page_with_user(
        "Recommended",
        &user,
        student_views::recommendations(&recommendations, user.level()),
    ))
}

async fn recommendations_refresh(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let picked = state
        .adaptive
        .regenerate_recommendations(&user)
        .await
        .reject("could not refresh recommendations")??;
    tracing::info!(
        "user_id={} refreshed recommendations ({} picked)",
        user.id,
        picked.len()
    );
    Ok(Redirect::to(names::RECOMMENDATIONS_URL))
}

/// Mark a recommendation as followed and go to its content.
async fn recommendation_open(
    Guarded(user, _): Guarded<StudentPage>,
    State(state): State<AppState>,
    Path(recommendation_id): Path<i64>,
) -> Result<Redirect, AppError> {
    let content_id = state
        .adaptive
        .recommendations(&user)
        .await
        .reject("could not load recommendations")?
        .into_iter()
        .find(|rec| rec.id == recommendation_id)
        .map(|rec| rec.content.id)
        .ok_or(AppError::NotFound)?;
    state
        .adaptive
        .click_recommendation(&user, recommendation_id)
        .await
        .reject("could not record click")??;
    Ok(Redirect::to(&names::content_url(content_id)))
}
