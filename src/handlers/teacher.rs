use std::collections::HashMap;

use axum::{
    extract::{Form, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::{
    db::models::User,
    extractors::{Guarded, TeacherPage},
    handlers::{content_from_multipart, optional_number, QuestionFields},
    models::{GradeInput, GradeSubmission, NewTest, Role, TestType, TestUpdate},
    names,
    rejections::{AppError, ResultExt},
    services::Refusal,
    views, AppState,
};

use crate::views::teacher as teacher_views;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(names::TEACHER_DASHBOARD_URL, get(dashboard))
        .route(names::TEACHER_TESTS_URL, get(tests_page))
        .route(names::NEW_TEST_URL, get(new_test_page).post(new_test_post))
        .route(
            "/teacher/tests/{id}/edit",
            get(edit_test_page).post(edit_test_post),
        )
        .route("/teacher/tests/{id}/delete", post(delete_test_post))
        .route(
            "/teacher/tests/{id}/questions",
            get(questions_page).post(add_question_post),
        )
        .route(
            "/teacher/tests/{id}/questions/{question_id}/delete",
            post(delete_question_post),
        )
        .route(names::TEACHER_CONTENTS_URL, get(contents_page))
        .route(
            names::NEW_CONTENT_URL,
            get(new_content_page).post(new_content_post),
        )
        .route("/teacher/contents/{id}/test", post(content_test_post))
        .route("/teacher/contents/{id}/delete", post(delete_content_post))
        .route(names::GRADING_URL, get(grading_page))
        .route(
            "/teacher/grading/{session_id}",
            get(grade_page).post(grade_post),
        )
        .route(names::REPORTS_URL, get(reports_page))
        .route("/teacher/reports/{student_id}", get(student_report_page))
}

/// Re-render a form with the refusal message, or turn other refusals into errors.
fn form_refusal(
    refusal: Refusal,
    render: impl FnOnce(&'static str) -> maud::Markup,
) -> Result<Response, AppError> {
    match refusal {
        Refusal::Invalid(msg) => Ok((StatusCode::BAD_REQUEST, render(msg)).into_response()),
        other => Err(other.into()),
    }
}

async fn dashboard(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let data = state
        .analytics
        .teacher_dashboard(&user)
        .await
        .reject("could not load dashboard")?;
    Ok(views::page_with_user(
        "Dashboard",
        &user,
        teacher_views::dashboard(&data),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

async fn tests_page(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let tests = state
        .assessment
        .all_tests()
        .await
        .reject("could not list tests")?;
    Ok(views::page_with_user(
        "Tests",
        &user,
        teacher_views::tests_list(&tests),
    ))
}

async fn new_test_page(Guarded(user, _): Guarded<TeacherPage>) -> maud::Markup {
    views::page_with_user("New test", &user, teacher_views::new_test_form(None))
}

#[derive(Deserialize)]
struct TestSettingsForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    min_level: Option<String>,
    target_level: Option<String>,
    time_limit_minutes: Option<String>,
    passing_score: Option<String>,
}

#[derive(Deserialize)]
struct NewTestForm {
    test_type: Option<String>,
    #[serde(flatten)]
    settings: TestSettingsForm,
    #[serde(flatten)]
    question: QuestionFields,
}

impl NewTestForm {
    fn into_new_test(self) -> Result<NewTest, &'static str> {
        let test_type = match self.test_type.as_deref() {
            None | Some("") => TestType::General,
            Some(t) => t.parse().map_err(|_| "unknown test type")?,
        };
        let settings = self.settings;
        let number = |value: Option<String>, default: i64| {
            optional_number(value.as_deref()).map(|v| v.unwrap_or(default))
        };
        Ok(NewTest {
            title: settings.title.trim().to_string(),
            description: settings.description.trim().to_string(),
            test_type,
            min_level: number(settings.min_level, names::MIN_LEVEL)?,
            target_level: number(settings.target_level, names::MIN_LEVEL)?,
            time_limit_minutes: number(
                settings.time_limit_minutes,
                names::DEFAULT_TIME_LIMIT_MINUTES,
            )?,
            passing_score: number(settings.passing_score, names::DEFAULT_PASSING_SCORE)?,
            questions: vec![self.question.into_input()?],
        })
    }
}

async fn new_test_post(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Form(form): Form<NewTestForm>,
) -> Result<Response, AppError> {
    let render = |msg: &'static str| {
        views::page_with_user("New test", &user, teacher_views::new_test_form(Some(msg)))
    };

    let new_test = match form.into_new_test() {
        Ok(new_test) => new_test,
        Err(msg) => return Ok((StatusCode::BAD_REQUEST, render(msg)).into_response()),
    };
    let placement = new_test.test_type == TestType::Placement;

    match state
        .assessment
        .create_test(&user, new_test, placement)
        .await
        .reject("could not create test")?
    {
        Ok(test) => {
            tracing::info!("user_id={} created test_id={}", user.id, test.id);
            Ok(Redirect::to(&names::test_questions_url(test.id)).into_response())
        }
        Err(refusal) => form_refusal(refusal, render),
    }
}

async fn edit_test_page(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<maud::Markup, AppError> {
    let test = state
        .db
        .get_test(test_id)
        .await
        .reject("could not load test")?
        .ok_or(AppError::NotFound)?;
    if !state
        .assessment
        .can_manage(&user, &test)
        .await
        .reject("could not check test access")?
    {
        return Err(AppError::Forbidden);
    }
    Ok(views::page_with_user(
        "Edit test",
        &user,
        teacher_views::edit_test_form(&test, None, false),
    ))
}

#[derive(Deserialize)]
struct EditTestForm {
    #[serde(flatten)]
    settings: TestSettingsForm,
    is_active: Option<String>,
}

impl EditTestForm {
    fn into_update(self) -> Result<TestUpdate, &'static str> {
        let settings = self.settings;
        Ok(TestUpdate {
            title: Some(settings.title.trim().to_string()),
            description: Some(settings.description.trim().to_string()),
            min_level: optional_number(settings.min_level.as_deref())?,
            target_level: optional_number(settings.target_level.as_deref())?,
            time_limit_minutes: optional_number(settings.time_limit_minutes.as_deref())?,
            passing_score: optional_number(settings.passing_score.as_deref())?,
            is_active: Some(self.is_active.is_some()),
        })
    }
}

async fn edit_test_post(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
    Form(form): Form<EditTestForm>,
) -> Result<Response, AppError> {
    let update = form.into_update().map_err(AppError::Input)?;
    match state
        .assessment
        .update_test(&user, test_id, &update)
        .await
        .reject("could not update test")?
    {
        Ok(test) => Ok(views::page_with_user(
            "Edit test",
            &user,
            teacher_views::edit_test_form(&test, None, true),
        )
        .into_response()),
        Err(Refusal::Invalid(msg)) => {
            let test = state
                .db
                .get_test(test_id)
                .await
                .reject("could not load test")?
                .ok_or(AppError::NotFound)?;
            Ok((
                StatusCode::BAD_REQUEST,
                views::page_with_user(
                    "Edit test",
                    &user,
                    teacher_views::edit_test_form(&test, Some(msg), false),
                ),
            )
                .into_response())
        }
        Err(refusal) => Err(refusal.into()),
    }
}

async fn delete_test_post(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<Redirect, AppError> {
    state
        .assessment
        .delete_test(&user, test_id)
        .await
        .reject("could not delete test")??;
    tracing::info!("user_id={} deleted test_id={test_id}", user.id);
    Ok(Redirect::to(names::TEACHER_TESTS_URL))
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

async fn render_questions(
    state: &AppState,
    user: &User,
    test_id: i64,
    error: Option<&str>,
) -> Result<maud::Markup, AppError> {
    let questions = state
        .assessment
        .questions(user, test_id)
        .await
        .reject("could not list questions")??;
    let test = state
        .db
        .get_test(test_id)
        .await
        .reject("could not load test")?
        .ok_or(AppError::NotFound)?;
    Ok(views::page_with_user(
        "Questions",
        user,
        teacher_views::questions_page(&test, &questions, error),
    ))
}

async fn questions_page(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> Result<maud::Markup, AppError> {
    render_questions(&state, &user, test_id, None).await
}

async fn add_question_post(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
    Form(fields): Form<QuestionFields>,
) -> Result<Response, AppError> {
    let input = match fields.into_input() {
        Ok(input) => input,
        Err(msg) => return question_refused(&state, &user, test_id, msg).await,
    };
    match state
        .assessment
        .add_question(&user, test_id, &input)
        .await
        .reject("could not add question")?
    {
        Ok(question) => {
            tracing::info!("added question_id={} to test_id={test_id}", question.id);
            Ok(Redirect::to(&names::test_questions_url(test_id)).into_response())
        }
        Err(Refusal::Invalid(msg)) => question_refused(&state, &user, test_id, msg).await,
        Err(refusal) => Err(refusal.into()),
    }
}

async fn question_refused(
    state: &AppState,
    user: &User,
    test_id: i64,
    msg: &'static str,
) -> Result<Response, AppError> {
    let page = render_questions(state, user, test_id, Some(msg)).await?;
    Ok((StatusCode::BAD_REQUEST, page).into_response())
}

async fn delete_question_post(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path((_test_id, question_id)): Path<(i64, i64)>,
) -> Result<Redirect, AppError> {
    let test_id = state
        .assessment
        .delete_question(&user, question_id)
        .await
        .reject("could not delete question")??;
    Ok(Redirect::to(&names::test_questions_url(test_id)))
}

// ---------------------------------------------------------------------------
// Contents
// ---------------------------------------------------------------------------

async fn contents_page(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let contents = state
        .adaptive
        .authored_contents(&user)
        .await
        .reject("could not list contents")?;
    Ok(views::page_with_user(
        "Contents",
        &user,
        teacher_views::contents_list(&contents),
    ))
}

async fn new_content_page(Guarded(user, _): Guarded<TeacherPage>) -> maud::Markup {
    views::page_with_user("New content", &user, teacher_views::new_content_form(None))
}

async fn new_content_post(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let (content, file) = content_from_multipart(multipart).await?;
    match state
        .adaptive
        .create_content(&user, &content, file.as_ref())
        .await
        .reject("could not create content")?
    {
        Ok(created) => {
            tracing::info!("user_id={} created content_id={}", user.id, created.id);
            Ok(Redirect::to(names::TEACHER_CONTENTS_URL).into_response())
        }
        Err(refusal) => form_refusal(refusal, |msg| {
            views::page_with_user(
                "New content",
                &user,
                teacher_views::new_content_form(Some(msg)),
            )
        }),
    }
}

async fn content_test_post(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Result<Redirect, AppError> {
    let content_test = state
        .assessment
        .content_test(&user, content_id)
        .await
        .reject("could not create content test")??;
    if content_test.created {
        tracing::info!(
            "created test_id={} for content_id={content_id}",
            content_test.test.id
        );
    }
    Ok(Redirect::to(&names::test_questions_url(content_test.test.id)))
}

async fn delete_content_post(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Result<Redirect, AppError> {
    state
        .adaptive
        .delete_content(&user, content_id)
        .await
        .reject("could not delete content")??;
    tracing::info!("user_id={} deleted content_id={content_id}", user.id);
    Ok(Redirect::to(names::TEACHER_CONTENTS_URL))
}

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

async fn grading_page(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let sessions = state
        .assessment
        .pending_reviews(&user)
        .await
        .reject("could not list pending reviews")?;
    Ok(views::page_with_user(
        "Grading",
        &user,
        teacher_views::grading_list(&sessions),
    ))
}

async fn render_grade_form(
    state: &AppState,
    user: &User,
    session_id: i64,
    error: Option<&str>,
) -> Result<maud::Markup, AppError> {
    let detail = state
        .assessment
        .session_detail(user, session_id)
        .await
        .reject("could not load session")??;
    Ok(views::page_with_user(
        "Grade",
        user,
        teacher_views::grade_form(&detail, error),
    ))
}

async fn grade_page(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<maud::Markup, AppError> {
    render_grade_form(&state, &user, session_id, None).await
}

/// Collect `score_<answer_id>` fields and the feedback box.
fn grade_submission(form: &HashMap<String, String>) -> Result<GradeSubmission, &'static str> {
    let mut grades = Vec::new();
    for (key, value) in form {
        let Some(answer_id) = key.strip_prefix("score_") else {
            continue;
        };
        let answer_id = answer_id.parse().map_err(|_| "invalid answer id")?;
        let score = value
            .trim()
            .parse()
            .map_err(|_| "scores must be numbers")?;
        grades.push(GradeInput { answer_id, score });
    }
    grades.sort_by_key(|g| g.answer_id);
    Ok(GradeSubmission {
        grades,
        feedback: form.get("feedback").cloned(),
    })
}

async fn grade_post(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let submission = match grade_submission(&form) {
        Ok(submission) => submission,
        Err(msg) => return grade_refused(&state, &user, session_id, msg).await,
    };
    match state
        .assessment
        .grade(&user, session_id, &submission)
        .await
        .reject("could not grade session")?
    {
        Ok(finished) => {
            tracing::info!(
                "user_id={} graded session_id={session_id}: {:.2}",
                user.id,
                finished.total_score
            );
            Ok(Redirect::to(names::GRADING_URL).into_response())
        }
        Err(Refusal::Invalid(msg)) => grade_refused(&state, &user, session_id, msg).await,
        Err(refusal) => Err(refusal.into()),
    }
}

async fn grade_refused(
    state: &AppState,
    user: &User,
    session_id: i64,
    msg: &'static str,
) -> Result<Response, AppError> {
    let page = render_grade_form(state, user, session_id, Some(msg)).await?;
    Ok((StatusCode::BAD_REQUEST, page).into_response())
}

async fn reports_page(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
) -> Result<maud::Markup, AppError> {
    let system = if user.role == Role::Admin {
        Some(
            state
                .analytics
                .system_report()
                .await
                .reject("could not build system report")?,
        )
    } else {
        None
    };
    let students = state
        .analytics
        .students()
        .await
        .reject("could not list students")?;
    Ok(views::page_with_user(
        "Reports",
        &user,
        teacher_views::reports(system.as_ref(), &students),
    ))
}

async fn student_report_page(
    Guarded(user, _): Guarded<TeacherPage>,
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
) -> Result<maud::Markup, AppError> {
    let summary = state
        .analytics
        .student_report(student_id)
        .await
        .reject("could not build student report")??;
    let student = state
        .db
        .find_user(student_id)
        .await
        .reject("could not load student")?
        .ok_or(AppError::NotFound)?;
    let history = state
        .db
        .level_history(student_id)
        .await
        .reject("could not load level history")?;
    Ok(views::page_with_user(
        "Student report",
        &user,
        teacher_views::student_report(&student, &summary, &history),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_form_collects_scores_and_feedback() {
        let form = HashMap::from([
            ("score_7".to_string(), "4.5".to_string()),
            ("score_3".to_string(), " 10 ".to_string()),
            ("feedback".to_string(), "Good work".to_string()),
            ("session_id".to_string(), "1".to_string()),
        ]);
        let submission = grade_submission(&form).unwrap();
        assert_eq!(submission.grades.len(), 2);
        assert_eq!(submission.grades[0].answer_id, 3);
        assert_eq!(submission.grades[0].score, 10.0);
        assert_eq!(submission.grades[1].score, 4.5);
        assert_eq!(submission.feedback.as_deref(), Some("Good work"));
    }

    #[test]
    fn grade_form_rejects_text_scores() {
        let form = HashMap::from([("score_1".to_string(), "ten".to_string())]);
        assert!(grade_submission(&form).is_err());
    }

    #[test]
    fn new_test_form_builds_one_question() {
        let form: NewTestForm = serde_json::from_value(serde_json::json!({
            "title": "Memory 1",
            "test_type": "placement",
            "min_level": "",
            "time_limit_minutes": "15",
            "question_text": "Pick one",
            "choice_1": "a",
            "choice_2": "b",
            "correct": "2",
        }))
        .unwrap();
        let test = form.into_new_test().unwrap();
        assert_eq!(test.test_type, TestType::Placement);
        assert_eq!(test.min_level, 1);
        assert_eq!(test.time_limit_minutes, 15);
        assert_eq!(test.passing_score, names::DEFAULT_PASSING_SCORE);
        assert_eq!(test.questions.len(), 1);
        assert!(test.questions[0].choices[1].is_correct);
    }
}
