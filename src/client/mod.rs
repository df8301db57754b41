//! Typed client for the JSON API under `/api`.
//!
//! [`ApiClient`] wraps one `reqwest::Client`. Each call reads the bearer token
//! from a [`TokenStore`] so logging in or out elsewhere takes effect on the
//! next request.

pub mod attempt;
pub mod identity;
pub mod token;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db::models::{
        CognitiveTest, Content, ContentProgress, LearningPath, Notification,
        PerformanceSummary, Question, Recommendation, TestResult, TestSession, User,
    },
    models::{
        AnswerInput, ContentUpdate, Credentials, GradeSubmission, NewContent, NewTest,
        PasswordChange, ProfileUpdate, QuestionInput, Registration, TestUpdate, UploadedFile,
    },
    services::{
        adaptive::{AdaptiveDashboard, ProgressUpdate},
        analytics::{StudentDashboard, SystemReport, TeacherDashboard},
        assessment::{ContentTest, Finished, SessionDetail, TestDetail},
    },
};

pub use attempt::{run_with_countdown, Attempt, AttemptApi, Navigation};
pub use identity::{login_flow, Identity};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {detail}")]
    Status { status: u16, detail: String },

    #[error("token store error: {0}")]
    Token(String),
}

impl ClientError {
    /// The server did not accept the credentials or the token.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ClientError::Status {
                status: 401 | 403,
                ..
            }
        )
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Deserialize)]
struct AccessToken {
    access: String,
}

#[derive(Deserialize)]
struct AnswerSaved {
    answer_id: i64,
}

/// A session as returned by the start endpoint, along with whether it is new.
#[derive(Clone, Debug)]
pub struct StartedSession {
    pub session: TestSession,
    pub created: bool,
}

/// A downloaded content attachment.
#[derive(Clone, Debug)]
pub struct FileDownload {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Turn a non-success response into [`ClientError::Status`].
///
/// The server answers errors with `{"detail": ...}`; anything else is kept
/// as raw text.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.detail)
        .unwrap_or(text);
    Err(ClientError::Status {
        status: status.as_u16(),
        detail,
    })
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:1414`.
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = format!("{}/api{path}", self.base_url);
        let builder = self.http.request(method, url);
        Ok(match self.tokens.load()? {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let resp = builder.send().await?;
        check_response(resp).await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
    ) -> Result<T, ClientError> {
        let resp = self.send(self.request(method, path)?).await?;
        Ok(resp.json().await?)
    }

    async fn fetch_with<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.send(self.request(method, path)?.json(body)).await?;
        Ok(resp.json().await?)
    }

    async fn execute(&self, method: Method, path: &str) -> Result<(), ClientError> {
        self.send(self.request(method, path)?).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    /// Exchange credentials for a token and keep it in the store.
    pub async fn login(&self, credentials: &Credentials) -> Result<String, ClientError> {
        let token: AccessToken = self
            .fetch_with(Method::POST, "/accounts/login/", credentials)
            .await?;
        self.tokens.save(&token.access)?;
        Ok(token.access)
    }

    pub async fn register(&self, registration: &Registration) -> Result<User, ClientError> {
        self.fetch_with(Method::POST, "/accounts/register/", registration)
            .await
    }

    /// Revoke the token on the server. The stored token is cleared either way.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let revoked = self.execute(Method::POST, "/accounts/logout/").await;
        self.tokens.clear()?;
        revoked
    }

    pub async fn profile(&self) -> Result<User, ClientError> {
        self.fetch(Method::GET, "/accounts/profile/").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        self.fetch_with(Method::PATCH, "/accounts/profile/", update)
            .await
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), ClientError> {
        let builder = self
            .request(Method::POST, "/accounts/change-password/")?
            .json(change);
        self.send(builder).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Assessment
    // -----------------------------------------------------------------------

    pub async fn all_tests(&self) -> Result<Vec<CognitiveTest>, ClientError> {
        self.fetch(Method::GET, "/assessment/teacher/tests/all/")
            .await
    }

    pub async fn create_test(&self, test: &NewTest) -> Result<CognitiveTest, ClientError> {
        self.fetch_with(Method::POST, "/assessment/teacher/tests/create/", test)
            .await
    }

    pub async fn create_placement_test(
        &self,
        test: &NewTest,
    ) -> Result<CognitiveTest, ClientError> {
        self.fetch_with(
            Method::POST,
            "/assessment/teacher/tests/placement/create/",
            test,
        )
        .await
    }

    pub async fn update_test(
        &self,
        test_id: i64,
        update: &TestUpdate,
    ) -> Result<CognitiveTest, ClientError> {
        let path = format!("/assessment/teacher/tests/update/{test_id}/");
        self.fetch_with(Method::PUT, &path, update).await
    }

    pub async fn delete_test(&self, test_id: i64) -> Result<(), ClientError> {
        let path = format!("/assessment/teacher/tests/delete/{test_id}/");
        self.execute(Method::DELETE, &path).await
    }

    pub async fn content_test(&self, content_id: i64) -> Result<ContentTest, ClientError> {
        let path = format!("/assessment/content/{content_id}/test/create/");
        self.fetch(Method::POST, &path).await
    }

    pub async fn questions(&self, test_id: i64) -> Result<Vec<Question>, ClientError> {
        let path = format!("/assessment/teacher/tests/{test_id}/questions/list/");
        self.fetch(Method::GET, &path).await
    }

    pub async fn add_question(
        &self,
        test_id: i64,
        question: &QuestionInput,
    ) -> Result<Question, ClientError> {
        let path = format!("/assessment/teacher/tests/{test_id}/questions/");
        self.fetch_with(Method::POST, &path, question).await
    }

    pub async fn update_question(
        &self,
        question_id: i64,
        question: &QuestionInput,
    ) -> Result<Question, ClientError> {
        let path = format!("/assessment/teacher/questions/{question_id}/update/");
        self.fetch_with(Method::PUT, &path, question).await
    }

    pub async fn delete_question(&self, question_id: i64) -> Result<(), ClientError> {
        let path = format!("/assessment/teacher/questions/{question_id}/delete/");
        self.execute(Method::DELETE, &path).await
    }

    pub async fn tests(&self) -> Result<Vec<CognitiveTest>, ClientError> {
        self.fetch(Method::GET, "/assessment/tests/").await
    }

    pub async fn test_detail(&self, test_id: i64) -> Result<TestDetail, ClientError> {
        self.fetch(Method::GET, &format!("/assessment/tests/{test_id}/"))
            .await
    }

    pub async fn start(&self, test_id: i64) -> Result<StartedSession, ClientError> {
        let path = format!("/assessment/tests/{test_id}/start/");
        let resp = self.send(self.request(Method::POST, &path)?).await?;
        let created = resp.status() == StatusCode::CREATED;
        let session = resp.json().await?;
        Ok(StartedSession { session, created })
    }

    pub async fn submit_answer(
        &self,
        session_id: i64,
        question_id: i64,
        answer: &AnswerInput,
    ) -> Result<i64, ClientError> {
        let path = format!("/assessment/sessions/{session_id}/questions/{question_id}/answer/");
        let saved: AnswerSaved = self.fetch_with(Method::POST, &path, answer).await?;
        Ok(saved.answer_id)
    }

    pub async fn finish(&self, session_id: i64) -> Result<Finished, ClientError> {
        let path = format!("/assessment/sessions/{session_id}/finish/");
        self.fetch(Method::POST, &path).await
    }

    pub async fn pending_reviews(&self) -> Result<Vec<TestSession>, ClientError> {
        self.fetch(Method::GET, "/assessment/teacher/reviews/pending/")
            .await
    }

    pub async fn session_detail(&self, session_id: i64) -> Result<SessionDetail, ClientError> {
        let path = format!("/assessment/teacher/sessions/{session_id}/");
        self.fetch(Method::GET, &path).await
    }

    pub async fn grade(
        &self,
        session_id: i64,
        submission: &GradeSubmission,
    ) -> Result<Finished, ClientError> {
        let path = format!("/assessment/teacher/sessions/{session_id}/grade/");
        self.fetch_with(Method::POST, &path, submission).await
    }

    pub async fn result(&self, session_id: i64) -> Result<TestResult, ClientError> {
        let path = format!("/assessment/results/{session_id}/");
        self.fetch(Method::GET, &path).await
    }

    pub async fn history(&self) -> Result<Vec<TestSession>, ClientError> {
        self.fetch(Method::GET, "/assessment/my-history/").await
    }

    // -----------------------------------------------------------------------
    // Adaptive learning
    // -----------------------------------------------------------------------

    pub async fn contents(&self) -> Result<Vec<Content>, ClientError> {
        self.fetch(Method::GET, "/adaptive-learning/contents/").await
    }

    pub async fn content(&self, content_id: i64) -> Result<Content, ClientError> {
        let path = format!("/adaptive-learning/content/{content_id}/");
        self.fetch(Method::GET, &path).await
    }

    pub async fn content_file(&self, content_id: i64) -> Result<FileDownload, ClientError> {
        let path = format!("/adaptive-learning/content/{content_id}/file");
        let resp = self.send(self.request(Method::GET, &path)?).await?;
        let media_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();
        Ok(FileDownload { media_type, bytes })
    }

    /// Record progress on a content item. `None` marks it finished.
    pub async fn update_progress(
        &self,
        content_id: i64,
        progress_percent: Option<f64>,
    ) -> Result<ProgressUpdate, ClientError> {
        let path = format!("/adaptive-learning/content/{content_id}/progress/");
        let mut builder = self.request(Method::POST, &path)?;
        if let Some(progress_percent) = progress_percent {
            builder = builder.json(&serde_json::json!({ "progress_percent": progress_percent }));
        }
        Ok(self.send(builder).await?.json().await?)
    }

    pub async fn progress(&self) -> Result<Vec<ContentProgress>, ClientError> {
        self.fetch(Method::GET, "/adaptive-learning/progress/").await
    }

    /// Rebuild the recommendations for the signed-in student and return them.
    pub async fn recommended(&self) -> Result<Vec<Recommendation>, ClientError> {
        self.fetch(Method::GET, "/adaptive-learning/recommended/")
            .await
    }

    pub async fn recommendations(&self) -> Result<Vec<Recommendation>, ClientError> {
        self.fetch(Method::GET, "/adaptive-learning/recommendations/")
            .await
    }

    pub async fn click_recommendation(&self, recommendation_id: i64) -> Result<(), ClientError> {
        let path = format!("/adaptive-learning/recommendations/{recommendation_id}/click/");
        self.execute(Method::POST, &path).await
    }

    pub async fn learning_path(&self) -> Result<Option<LearningPath>, ClientError> {
        self.fetch(Method::GET, "/adaptive-learning/learning-path/")
            .await
    }

    pub async fn reset_learning_path(&self) -> Result<LearningPath, ClientError> {
        self.fetch(Method::POST, "/adaptive-learning/learning-path/reset/")
            .await
    }

    pub async fn adaptive_dashboard(&self) -> Result<AdaptiveDashboard, ClientError> {
        self.fetch(Method::GET, "/adaptive-learning/dashboard/").await
    }

    pub async fn teacher_contents(&self) -> Result<Vec<Content>, ClientError> {
        self.fetch(Method::GET, "/adaptive-learning/teacher/contents/")
            .await
    }

    pub async fn create_content(&self, content: &NewContent) -> Result<Content, ClientError> {
        self.fetch_with(
            Method::POST,
            "/adaptive-learning/teacher/content/create/",
            content,
        )
        .await
    }

    /// Create content with an attached file, sent as a multipart form.
    pub async fn create_content_with_file(
        &self,
        content: &NewContent,
        file: UploadedFile,
    ) -> Result<Content, ClientError> {
        use reqwest::multipart::{Form, Part};

        let part = Part::bytes(file.bytes)
            .file_name(file.name)
            .mime_str(&file.media_type)?;
        let mut form = Form::new()
            .text("title", content.title.clone())
            .text("content_type", content.content_type.as_str().to_string())
            .text("body", content.body.clone())
            .text("min_level", content.min_level.to_string())
            .text("max_level", content.max_level.to_string())
            .part("file", part);
        if let Some(video_url) = &content.video_url {
            form = form.text("video_url", video_url.clone());
        }

        let builder = self
            .request(Method::POST, "/adaptive-learning/teacher/content/create/")?
            .multipart(form);
        Ok(self.send(builder).await?.json().await?)
    }

    pub async fn update_content(
        &self,
        content_id: i64,
        update: &ContentUpdate,
    ) -> Result<Content, ClientError> {
        let path = format!("/adaptive-learning/teacher/content/{content_id}/update/");
        self.fetch_with(Method::PUT, &path, update).await
    }

    pub async fn delete_content(&self, content_id: i64) -> Result<(), ClientError> {
        let path = format!("/adaptive-learning/teacher/content/{content_id}/delete/");
        self.execute(Method::DELETE, &path).await
    }

    // -----------------------------------------------------------------------
    // Analytics
    // -----------------------------------------------------------------------

    pub async fn my_stats(&self) -> Result<PerformanceSummary, ClientError> {
        self.fetch(Method::GET, "/analytics/my-stats/").await
    }

    pub async fn system_report(&self) -> Result<SystemReport, ClientError> {
        self.fetch(Method::GET, "/analytics/system-report/").await
    }

    pub async fn student_report(&self, student_id: i64) -> Result<PerformanceSummary, ClientError> {
        let path = format!("/analytics/student-report/{student_id}/");
        self.fetch(Method::GET, &path).await
    }

    pub async fn teacher_dashboard(&self) -> Result<TeacherDashboard, ClientError> {
        self.fetch(Method::GET, "/analytics/teacher-dashboard/").await
    }

    pub async fn student_dashboard(&self) -> Result<StudentDashboard, ClientError> {
        self.fetch(Method::GET, "/analytics/student-dashboard/").await
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.fetch(Method::GET, "/analytics/notifications/").await
    }

    pub async fn mark_notification_read(&self, notification_id: i64) -> Result<(), ClientError> {
        let path = format!("/analytics/notifications/{notification_id}/read/");
        self.execute(Method::POST, &path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &'static str) -> reqwest::Response {
        reqwest::Response::from(
            axum::http::Response::builder()
                .status(status)
                .body(body)
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn success_passes_through() {
        let resp = check_response(response(200, "{}")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn detail_is_extracted_from_error_body() {
        let err = check_response(response(403, r#"{"detail":"forbidden"}"#))
            .await
            .unwrap_err();
        match err {
            ClientError::Status { status, detail } => {
                assert_eq!(status, 403);
                assert_eq!(detail, "forbidden");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn plain_text_errors_are_kept() {
        let err = check_response(response(500, "boom")).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Status { status: 500, ref detail } if detail == "boom"
        ));
        assert!(!err.is_auth());
    }

    #[test]
    fn auth_failures_are_recognised() {
        for status in [401, 403] {
            let err = ClientError::Status {
                status,
                detail: String::new(),
            };
            assert!(err.is_auth());
        }
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let client = ApiClient::new("http://localhost:1414/", Arc::new(MemoryTokenStore::default()));
        assert_eq!(client.base_url, "http://localhost:1414");
    }
}
