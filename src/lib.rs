pub mod client;
pub mod db;
pub mod extractors;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod names;
pub mod rejections;
pub mod services;
pub mod statics;
pub mod utils;
pub mod views;

use axum::{middleware, Router};

use services::{
    adaptive::AdaptiveService, analytics::AnalyticsService, assessment::AssessmentService,
    auth::AuthService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: db::Db,
    pub auth: AuthService,
    pub assessment: AssessmentService,
    pub adaptive: AdaptiveService,
    pub analytics: AnalyticsService,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(db: db::Db, secure_cookies: bool, token_ttl_hours: i64) -> Self {
        Self {
            auth: AuthService::new(db.clone(), token_ttl_hours),
            assessment: AssessmentService::new(db.clone()),
            adaptive: AdaptiveService::new(db.clone()),
            analytics: AnalyticsService::new(db.clone()),
            db,
            secure_cookies,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::homepage::routes())
        .merge(handlers::account::routes())
        .merge(handlers::student::routes())
        .merge(handlers::content::routes())
        .merge(handlers::teacher::routes())
        .nest("/api", handlers::api::routes())
        .layer(middleware::from_fn(csrf_check))
        .nest("/static", statics::routes())
        .with_state(state)
}

/// Browsers mark requests from other sites; state-changing ones are refused.
async fn csrf_check(
    req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    use axum::http::{Method, StatusCode};
    use axum::response::IntoResponse;

    let state_changing = [Method::POST, Method::PUT, Method::PATCH, Method::DELETE];

    if state_changing.contains(req.method()) {
        let cross_site = req
            .headers()
            .get("Sec-Fetch-Site")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("cross-site"));

        if cross_site {
            tracing::warn!("refused cross-site {} {}", req.method(), req.uri().path());
            return (StatusCode::FORBIDDEN, "CSRF check failed").into_response();
        }
    }

    next.run(req).await
}
