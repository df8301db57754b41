mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
};
use coglearn::{models::Role, names, router, AppState};
use tower::ServiceExt;

use coglearn::services::adaptive::AdaptiveService;
use common::{create_test_db, create_user, new_content, placed_student, token_for, PASSWORD};

fn app(db: coglearn::db::Db) -> axum::Router {
    router(AppState::new(db, false, 24))
}

async fn send(app: &axum::Router, req: Request<Body>) -> Response<Body> {
    app.clone()
        .oneshot(req)
        .await
        .expect("router should respond")
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    req.body(Body::empty()).expect("request build should succeed")
}

fn page(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::COOKIE, format!("{}={token}", names::AUTH_COOKIE_NAME))
        .body(Body::empty())
        .expect("request build should succeed")
}

fn page_post(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, format!("{}={token}", names::AUTH_COOKIE_NAME))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::empty())
        .expect("request build should succeed")
}

async fn text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn json(resp: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn api_rejects_requests_without_a_token() {
    let app = app(create_test_db().await);

    for uri in [
        "/api/accounts/profile/",
        "/api/assessment/tests/",
        "/api/assessment/my-history/",
        "/api/adaptive-learning/contents/",
        "/api/analytics/my-stats/",
    ] {
        let resp = send(&app, get(uri, None)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "expected 401 for {uri}");
        assert!(json(resp).await["detail"].is_string());
    }

    let resp = send(&app, get("/api/accounts/profile/", Some("not-a-token"))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn api_refuses_callers_outside_the_role() {
    let db = create_test_db().await;
    let student = placed_student(&db, "student", 10).await;
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let admin = create_user(&db, "admin", Role::Admin).await;
    let student_token = token_for(&db, &student).await;
    let teacher_token = token_for(&db, &teacher).await;
    let admin_token = token_for(&db, &admin).await;
    let app = app(db);

    let cases = [
        ("/api/assessment/teacher/tests/all/", &student_token, StatusCode::FORBIDDEN),
        ("/api/assessment/teacher/reviews/pending/", &student_token, StatusCode::FORBIDDEN),
        ("/api/adaptive-learning/teacher/contents/", &student_token, StatusCode::FORBIDDEN),
        ("/api/analytics/system-report/", &teacher_token, StatusCode::FORBIDDEN),
        ("/api/analytics/student-dashboard/", &teacher_token, StatusCode::FORBIDDEN),
        ("/api/assessment/teacher/tests/all/", &teacher_token, StatusCode::OK),
        ("/api/analytics/system-report/", &admin_token, StatusCode::OK),
        ("/api/analytics/student-dashboard/", &student_token, StatusCode::OK),
        ("/api/accounts/profile/", &student_token, StatusCode::OK),
    ];

    for (uri, token, expected) in cases {
        let resp = send(&app, get(uri, Some(token))).await;
        assert_eq!(resp.status(), expected, "unexpected status for {uri}");
    }
}

#[tokio::test]
async fn api_reports_malformed_json() {
    let app = app(create_test_db().await);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/accounts/login/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = send(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(resp).await["detail"], "invalid JSON body");
}

#[tokio::test]
async fn api_login_hands_out_a_usable_token() {
    let db = create_test_db().await;
    create_user(&db, "ada", Role::Teacher).await;
    let app = app(db);

    let login = |password: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/accounts/login/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "username": "ada", "password": password }).to_string(),
            ))
            .unwrap()
    };

    let resp = send(&app, login("wrong password")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(&app, login(PASSWORD)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token = json(resp).await["access"].as_str().unwrap().to_string();

    let resp = send(&app, get("/api/accounts/profile/", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["username"], "ada");
}

#[tokio::test]
async fn pages_send_anonymous_viewers_to_login() {
    let app = app(create_test_db().await);

    for uri in ["/dashboard", "/student/tests", "/teacher/grading", "/profile"] {
        let resp = send(&app, get(uri, None)).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "expected redirect for {uri}");
        assert_eq!(location(&resp), names::login_with_next(uri));
    }
}

#[tokio::test]
async fn unplaced_students_are_held_at_placement() {
    let db = create_test_db().await;
    let student = create_user(&db, "newcomer", Role::Student).await;
    let token = token_for(&db, &student).await;
    let app = app(db);

    for uri in ["/student/tests", "/student/dashboard", "/student/learning-path"] {
        let resp = send(&app, page(uri, &token)).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), names::PLACEMENT_TEST_URL);
    }

    let resp = send(&app, page(names::PLACEMENT_TEST_URL, &token)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, page(names::PROFILE_URL, &token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn pages_route_by_role() {
    let db = create_test_db().await;
    let student = placed_student(&db, "student", 10).await;
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student_token = token_for(&db, &student).await;
    let teacher_token = token_for(&db, &teacher).await;
    let app = app(db);

    let resp = send(&app, page("/dashboard", &student_token)).await;
    assert_eq!(location(&resp), names::STUDENT_DASHBOARD_URL);
    let resp = send(&app, page("/dashboard", &teacher_token)).await;
    assert_eq!(location(&resp), names::TEACHER_DASHBOARD_URL);

    let resp = send(&app, page("/teacher/tests", &student_token)).await;
    assert_eq!(location(&resp), names::DASHBOARD_URL);
    let resp = send(&app, page("/student/tests", &teacher_token)).await;
    assert_eq!(location(&resp), names::DASHBOARD_URL);

    // A placed student no longer needs the placement page.
    let resp = send(&app, page(names::PLACEMENT_TEST_URL, &student_token)).await;
    assert_eq!(location(&resp), names::STUDENT_DASHBOARD_URL);

    for (uri, token) in [
        ("/student/tests", &student_token),
        ("/student/dashboard", &student_token),
        ("/teacher/tests", &teacher_token),
        ("/teacher/dashboard", &teacher_token),
    ] {
        let resp = send(&app, page(uri, token)).await;
        assert_eq!(resp.status(), StatusCode::OK, "expected page for {uri}");
    }
}

#[tokio::test]
async fn login_form_sets_cookie_and_follows_next() {
    let db = create_test_db().await;
    placed_student(&db, "student", 10).await;
    let app = app(db);

    let post = |body: String| {
        Request::builder()
            .method(Method::POST)
            .uri(names::LOGIN_URL)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    };

    let resp = send(&app, post("username=student&password=correct+horse".to_string())).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), names::DASHBOARD_URL);
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with(&format!("{}=", names::AUTH_COOKIE_NAME)));
    assert!(cookie.contains("HttpOnly"));

    let resp = send(
        &app,
        post("username=student&password=correct+horse&next=%2Fstudent%2Fhistory".to_string()),
    )
    .await;
    assert_eq!(location(&resp), "/student/history");

    let resp = send(
        &app,
        post("username=student&password=correct+horse&next=%2F%2Fevil.example".to_string()),
    )
    .await;
    assert_eq!(location(&resp), names::DASHBOARD_URL);

    let resp = send(&app, post("username=student&password=nope".to_string())).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn cross_site_posts_are_refused() {
    let app = app(create_test_db().await);

    let req = Request::builder()
        .method(Method::POST)
        .uri(names::LOGIN_URL)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("Sec-Fetch-Site", "cross-site")
        .body(Body::from("username=a&password=b"))
        .unwrap();
    let resp = send(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = Request::builder()
        .method(Method::GET)
        .uri(names::LOGIN_URL)
        .header("Sec-Fetch-Site", "cross-site")
        .body(Body::empty())
        .unwrap();
    let resp = send(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn static_files_are_served() {
    let app = app(create_test_db().await);

    let resp = send(&app, get("/static/index.css", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/css"
    );

    let resp = send(&app, get("/static/missing.css", None)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recommendations_page_refreshes_and_opens_content() {
    let db = create_test_db().await;
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 10).await;
    let adaptive = AdaptiveService::new(db.clone());
    let content = adaptive
        .create_content(&teacher, &new_content("Attention drills", 5, 15), None)
        .await
        .unwrap()
        .unwrap();
    let token = token_for(&db, &student).await;
    let app = app(db);

    let resp = send(&app, page(names::RECOMMENDATIONS_URL, &token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!text(resp).await.contains("Attention drills"));

    let resp = send(&app, page_post(names::RECOMMENDATIONS_URL, &token)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), names::RECOMMENDATIONS_URL);

    let resp = send(&app, page(names::RECOMMENDATIONS_URL, &token)).await;
    assert!(text(resp).await.contains("Attention drills"));

    let picked = adaptive.recommendations(&student).await.unwrap();
    assert_eq!(picked.len(), 1);
    let resp = send(
        &app,
        page_post(&names::open_recommendation_url(picked[0].id), &token),
    )
    .await;
    assert_eq!(location(&resp), names::content_url(content.id));
    assert!(adaptive.recommendations(&student).await.unwrap()[0].is_clicked);

    let resp = send(&app, page_post(&names::open_recommendation_url(9999), &token)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reports_show_students_to_staff_only() {
    let db = create_test_db().await;
    let student = placed_student(&db, "student", 42).await;
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let admin = create_user(&db, "admin", Role::Admin).await;
    let student_token = token_for(&db, &student).await;
    let teacher_token = token_for(&db, &teacher).await;
    let admin_token = token_for(&db, &admin).await;
    let app = app(db);

    let resp = send(&app, page(names::REPORTS_URL, &student_token)).await;
    assert_eq!(location(&resp), names::DASHBOARD_URL);

    let resp = send(&app, page(names::REPORTS_URL, &teacher_token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = text(resp).await;
    assert!(body.contains(&names::student_report_url(student.id)));
    assert!(!body.contains("Average level"));

    let resp = send(&app, page(names::REPORTS_URL, &admin_token)).await;
    assert!(text(resp).await.contains("Average level"));

    let resp = send(&app, page(&names::student_report_url(student.id), &teacher_token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(text(resp).await.contains("Bronze"));

    let resp = send(&app, page(&names::student_report_url(teacher.id), &teacher_token)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
