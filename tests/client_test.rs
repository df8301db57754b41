mod common;

use std::sync::Arc;
use std::time::Duration;

use coglearn::client::{
    attempt, run_with_countdown, ApiClient, Attempt, ClientError, Identity, MemoryTokenStore,
    Navigation, TokenStore,
};
use coglearn::gate::{Access, IdentityState, Policy};
use coglearn::models::{AnswerInput, Credentials, Role, SessionStatus, TestType};
use coglearn::{client::login_flow, router, AppState};
use tokio::sync::oneshot;

use common::{create_test_db, create_user, mcq, new_test, placed_student, PASSWORD};

/// Serve a fresh app on an ephemeral port and return its base URL.
async fn spawn_server(db: coglearn::db::Db) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let address = listener.local_addr().expect("local address");
    let app = router(AppState::new(db, false, 24));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server runs");
    });
    format!("http://{address}")
}

fn client(base_url: &str, tokens: MemoryTokenStore) -> ApiClient {
    ApiClient::new(base_url, Arc::new(tokens))
}

fn credentials(username: &str, password: &str) -> Credentials {
    Credentials {
        username: username.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn login_flow_stores_token_and_lands_on_dashboard() {
    let db = create_test_db().await;
    let student = placed_student(&db, "student", 10).await;
    let base_url = spawn_server(db).await;

    let identity = Identity::new(client(&base_url, MemoryTokenStore::default()));
    let target = login_flow(&identity, &credentials("student", PASSWORD), None)
        .await
        .unwrap();

    assert_eq!(target, "/dashboard");
    assert!(identity.api().tokens().load().unwrap().is_some());
    assert_eq!(identity.user().map(|u| u.id), Some(student.id));
    assert_eq!(
        identity.access(&Policy::STUDENT, "/student/tests"),
        Access::Render
    );
    assert_eq!(
        identity.access(&Policy::TEACHER, "/teacher/tests"),
        Access::Redirect("/dashboard".to_string())
    );

    let target = login_flow(
        &identity,
        &credentials("student", PASSWORD),
        Some("/student/history"),
    )
    .await
    .unwrap();
    assert_eq!(target, "/student/history");
}

#[tokio::test]
async fn unplaced_student_is_sent_to_placement() {
    let db = create_test_db().await;
    create_user(&db, "newcomer", Role::Student).await;
    let base_url = spawn_server(db).await;

    let identity = Identity::new(client(&base_url, MemoryTokenStore::default()));
    identity
        .login(&credentials("newcomer", PASSWORD))
        .await
        .unwrap();

    assert_eq!(
        identity.access(&Policy::STUDENT, "/student/tests"),
        Access::Redirect("/student/placement-test".to_string())
    );
    assert_eq!(
        identity.access(&Policy::PLACEMENT, "/student/placement-test"),
        Access::Render
    );
}

#[tokio::test]
async fn wrong_password_is_an_auth_error() {
    let db = create_test_db().await;
    create_user(&db, "ada", Role::Teacher).await;
    let base_url = spawn_server(db).await;

    let identity = Identity::new(client(&base_url, MemoryTokenStore::default()));
    let err = login_flow(&identity, &credentials("ada", "nope"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Status { status: 401, .. }));
    assert!(identity.api().tokens().load().unwrap().is_none());
}

#[tokio::test]
async fn rejected_token_is_forgotten() {
    let db = create_test_db().await;
    let base_url = spawn_server(db).await;

    let identity = Identity::new(client(&base_url, MemoryTokenStore::with_token("stale")));
    let mut updates = identity.subscribe();

    assert_eq!(identity.load().await.unwrap(), None);
    assert_eq!(*updates.borrow_and_update(), IdentityState::Ready(None));
    assert!(identity.api().tokens().load().unwrap().is_none());
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let db = create_test_db().await;
    create_user(&db, "ada", Role::Teacher).await;
    let base_url = spawn_server(db).await;

    let identity = Identity::new(client(&base_url, MemoryTokenStore::default()));
    identity.login(&credentials("ada", PASSWORD)).await.unwrap();
    let token = identity.api().tokens().load().unwrap().unwrap();

    identity.logout().await.unwrap();
    assert_eq!(identity.state(), IdentityState::Ready(None));
    assert!(identity.api().tokens().load().unwrap().is_none());

    // The old token no longer works either.
    let stale = client(&base_url, MemoryTokenStore::with_token(token));
    let err = stale.profile().await.unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn countdown_submits_the_attempt_once() {
    let db = create_test_db().await;
    create_user(&db, "teacher", Role::Teacher).await;
    placed_student(&db, "student", 10).await;
    let base_url = spawn_server(db).await;

    let teacher = client(&base_url, MemoryTokenStore::default());
    teacher
        .login(&credentials("teacher", PASSWORD))
        .await
        .unwrap();
    let test = teacher
        .create_test(&new_test(
            "Logic",
            TestType::General,
            vec![mcq("a", 10), mcq("b", 10)],
        ))
        .await
        .unwrap();
    let answer_key = teacher.questions(test.id).await.unwrap();

    let student = client(&base_url, MemoryTokenStore::default());
    student
        .login(&credentials("student", PASSWORD))
        .await
        .unwrap();
    let started = student.start(test.id).await.unwrap();
    assert!(started.created);
    assert!(attempt::time_left(&started.session) <= Duration::from_secs(30 * 60));

    let detail = student.test_detail(test.id).await.unwrap();
    let mut attempt = Attempt::new(started.session.id, detail.questions);
    let first = &answer_key[0];
    let correct = first
        .choices
        .iter()
        .find(|c| c.is_correct == Some(true))
        .unwrap();
    attempt.answer(
        first.id,
        AnswerInput {
            selected_choice: Some(correct.id),
            ..Default::default()
        },
    );

    let (_keep_open, submit_signal) = oneshot::channel();
    let navigation = run_with_countdown(
        &attempt,
        &student,
        Duration::from_millis(20),
        submit_signal,
    )
    .await
    .unwrap();
    assert_eq!(navigation, Navigation::results(started.session.id));

    let result = student.result(started.session.id).await.unwrap();
    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.total_score, 50.0);

    // Starting again opens a new session rather than reusing the closed one.
    let again = student.start(test.id).await.unwrap();
    assert!(again.created);
    assert_ne!(again.session.id, started.session.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn countdown_submits_every_answer_concurrently() {
    let db = create_test_db().await;
    create_user(&db, "teacher", Role::Teacher).await;
    placed_student(&db, "student", 10).await;
    let base_url = spawn_server(db).await;

    let teacher = client(&base_url, MemoryTokenStore::default());
    teacher
        .login(&credentials("teacher", PASSWORD))
        .await
        .unwrap();
    let questions = (0..12).map(|i| mcq(&format!("q{i}"), 10)).collect();
    let test = teacher
        .create_test(&new_test("Recall", TestType::General, questions))
        .await
        .unwrap();
    let answer_key = teacher.questions(test.id).await.unwrap();

    let student = client(&base_url, MemoryTokenStore::default());
    student
        .login(&credentials("student", PASSWORD))
        .await
        .unwrap();
    let started = student.start(test.id).await.unwrap();
    let detail = student.test_detail(test.id).await.unwrap();
    let mut attempt = Attempt::new(started.session.id, detail.questions);

    // Every question right except the last one.
    for (i, question) in answer_key.iter().enumerate() {
        let wanted = i + 1 < answer_key.len();
        let choice = question
            .choices
            .iter()
            .find(|c| c.is_correct == Some(wanted))
            .unwrap();
        assert!(attempt.answer(
            question.id,
            AnswerInput {
                selected_choice: Some(choice.id),
                ..Default::default()
            },
        ));
    }
    assert_eq!(attempt.answers().len(), 12);

    let (_keep_open, submit_signal) = oneshot::channel();
    let navigation = run_with_countdown(
        &attempt,
        &student,
        Duration::from_millis(20),
        submit_signal,
    )
    .await
    .unwrap();
    assert_eq!(navigation, Navigation::results(started.session.id));

    let result = student.result(started.session.id).await.unwrap();
    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.answers.len(), 12);
    assert!((result.total_score - 110.0 / 120.0 * 100.0).abs() < 1e-9);

    // 91.7 passes and clears 90, so the level moves up by five.
    let profile = student.profile().await.unwrap();
    assert_eq!(profile.cognitive_level, Some(15));
}

#[tokio::test]
async fn staff_only_calls_surface_forbidden() {
    let db = create_test_db().await;
    placed_student(&db, "student", 10).await;
    let base_url = spawn_server(db).await;

    let student = client(&base_url, MemoryTokenStore::default());
    student
        .login(&credentials("student", PASSWORD))
        .await
        .unwrap();

    let err = student.all_tests().await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 403, .. }));
    let err = student.system_report().await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 403, .. }));

    let dashboard = student.student_dashboard().await.unwrap();
    assert_eq!(dashboard.identity.level, 10);
}
