use std::future::Future;

use color_eyre::Result;

use crate::db::{models::User, Db, NewUser};
use crate::models::{ProfileUpdate, Registration, Role};

// ---------------------------------------------------------------------------
// AuthRepository trait (DIP: service defines the abstraction it needs)
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait AuthRepository: Send + Sync {
    fn username_exists(&self, username: &str) -> impl Future<Output = Result<bool>> + Send;

    fn create_user(
        &self,
        registration: &Registration,
        role: Role,
    ) -> impl Future<Output = Result<i64>> + Send;

    fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn find_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>>> + Send;

    fn create_auth_token(&self, user_id: i64) -> impl Future<Output = Result<String>> + Send;

    fn get_user_by_token(
        &self,
        token: &str,
        ttl_hours: i64,
    ) -> impl Future<Output = Result<Option<User>>> + Send;

    fn delete_auth_token(&self, token: &str) -> impl Future<Output = Result<()>> + Send;

    fn update_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn log_event(
        &self,
        user_id: i64,
        event_type: &str,
        event_data: &serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl AuthRepository for Db {
    fn username_exists(&self, username: &str) -> impl Future<Output = Result<bool>> + Send {
        Db::username_exists(self, username)
    }

    fn create_user(
        &self,
        registration: &Registration,
        role: Role,
    ) -> impl Future<Output = Result<i64>> + Send {
        Db::create_user(
            self,
            NewUser {
                username: registration.username.trim(),
                password: &registration.password,
                email: registration.email.trim(),
                first_name: registration.first_name.trim(),
                last_name: registration.last_name.trim(),
                role,
            },
        )
    }

    fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<bool>> + Send {
        Db::verify_user_password(self, username, password)
    }

    fn find_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>>> + Send {
        Db::find_user_by_username(self, username)
    }

    fn create_auth_token(&self, user_id: i64) -> impl Future<Output = Result<String>> + Send {
        Db::create_auth_token(self, user_id)
    }

    fn get_user_by_token(
        &self,
        token: &str,
        ttl_hours: i64,
    ) -> impl Future<Output = Result<Option<User>>> + Send {
        Db::get_user_by_token(self, token, ttl_hours)
    }

    fn delete_auth_token(&self, token: &str) -> impl Future<Output = Result<()>> + Send {
        Db::delete_auth_token(self, token)
    }

    fn update_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<()>> + Send {
        Db::update_profile(self, user_id, update)
    }

    fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> impl Future<Output = Result<bool>> + Send {
        Db::change_password(self, user_id, current_password, new_password)
    }

    fn log_event(
        &self,
        user_id: i64,
        event_type: &str,
        event_data: &serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send {
        Db::log_event(self, user_id, event_type, event_data)
    }
}

// ---------------------------------------------------------------------------
// Outcome enums
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RegisterOutcome {
    /// User created. Contains the new user's id.
    Created(i64),
    /// Username or password was empty.
    EmptyFields,
    /// Username already in use.
    UsernameTaken,
    /// Password does not meet minimum requirements.
    WeakPassword,
    /// Unknown role, or a role that cannot be self-assigned.
    InvalidRole,
}

#[derive(Debug)]
pub enum LoginOutcome {
    /// Login succeeded. Contains the bearer token.
    Success(String),
    /// Password was incorrect (or username not found).
    InvalidCredentials,
}

#[derive(Debug)]
pub enum ChangePasswordOutcome {
    Success,
    EmptyFields,
    WeakPassword,
    IncorrectPassword,
}

const MIN_PASSWORD_LENGTH: usize = 8;

// ---------------------------------------------------------------------------
// AuthService
// ---------------------------------------------------------------------------

pub struct AuthService<R: AuthRepository = Db> {
    repo: R,
    token_ttl_hours: i64,
}

impl<R: AuthRepository + Clone> Clone for AuthService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            token_ttl_hours: self.token_ttl_hours,
        }
    }
}

impl<R: AuthRepository> AuthService<R> {
    pub fn new(repo: R, token_ttl_hours: i64) -> Self {
        Self {
            repo,
            token_ttl_hours,
        }
    }

    pub fn token_ttl_hours(&self) -> i64 {
        self.token_ttl_hours
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let username = username.trim();
        let verified = self.repo.verify_user_password(username, password).await?;

        if !verified {
            tracing::warn!("failed login attempt for username={username}");
            return Ok(LoginOutcome::InvalidCredentials);
        }

        let user = self
            .repo
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| color_eyre::eyre::eyre!("user not found after password verification"))?;

        let token = self.repo.create_auth_token(user.id).await?;
        self.repo
            .log_event(user.id, "login", &serde_json::json!({}))
            .await?;

        Ok(LoginOutcome::Success(token))
    }

    pub async fn register(&self, registration: &Registration) -> Result<RegisterOutcome> {
        if registration.username.trim().is_empty() || registration.password.is_empty() {
            return Ok(RegisterOutcome::EmptyFields);
        }

        let role = match registration.role.as_deref().map(str::trim) {
            None | Some("") => Role::Student,
            Some(role) => match role.parse::<Role>() {
                Ok(Role::Admin) | Err(_) => return Ok(RegisterOutcome::InvalidRole),
                Ok(role) => role,
            },
        };

        if registration.password.len() < MIN_PASSWORD_LENGTH {
            return Ok(RegisterOutcome::WeakPassword);
        }

        let exists = self
            .repo
            .username_exists(registration.username.trim())
            .await?;
        if exists {
            return Ok(RegisterOutcome::UsernameTaken);
        }

        let user_id = self.repo.create_user(registration, role).await?;
        Ok(RegisterOutcome::Created(user_id))
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.repo.delete_auth_token(token).await
    }

    /// Resolve a bearer token, rejecting tokens older than the configured lifetime.
    pub async fn user_for_token(&self, token: &str) -> Result<Option<User>> {
        self.repo
            .get_user_by_token(token, self.token_ttl_hours)
            .await
    }

    pub async fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<()> {
        self.repo.update_profile(user_id, update).await
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<ChangePasswordOutcome> {
        if current_password.is_empty() || new_password.is_empty() {
            return Ok(ChangePasswordOutcome::EmptyFields);
        }

        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Ok(ChangePasswordOutcome::WeakPassword);
        }

        let changed = self
            .repo
            .change_password(user_id, current_password, new_password)
            .await?;

        if changed {
            Ok(ChangePasswordOutcome::Success)
        } else {
            Ok(ChangePasswordOutcome::IncorrectPassword)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service(mock_repo: MockAuthRepository) -> AuthService<MockAuthRepository> {
        AuthService::new(mock_repo, 168)
    }

    fn student(id: i64) -> User {
        User {
            id,
            username: "sara".to_string(),
            email: "sara@example.com".to_string(),
            first_name: "Sara".to_string(),
            last_name: "Karimi".to_string(),
            role: Role::Student,
            cognitive_level: Some(1),
            has_taken_placement_test: false,
            created_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    fn registration(username: &str, password: &str, role: Option<&str>) -> Registration {
        Registration {
            username: username.to_string(),
            password: password.to_string(),
            role: role.map(str::to_string),
            ..Default::default()
        }
    }

    // ----- login tests -----

    #[tokio::test]
    async fn login_success_returns_token_and_logs_event() {
        let mut mock = MockAuthRepository::new();
        mock.expect_verify_user_password()
            .returning(|_, _| Box::pin(async { Ok(true) }));
        mock.expect_find_user_by_username()
            .returning(|_| Box::pin(async { Ok(Some(student(7))) }));
        mock.expect_create_auth_token()
            .withf(|user_id| *user_id == 7)
            .returning(|_| Box::pin(async { Ok("token-123".to_string()) }));
        mock.expect_log_event()
            .withf(|user_id, event_type, _| *user_id == 7 && event_type == "login")
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let svc = service(mock);
        let outcome = svc.login("sara", "password").await.unwrap();

        assert!(matches!(outcome, LoginOutcome::Success(ref t) if t == "token-123"));
    }

    #[tokio::test]
    async fn login_wrong_password_returns_invalid_credentials() {
        let mut mock = MockAuthRepository::new();
        mock.expect_verify_user_password()
            .returning(|_, _| Box::pin(async { Ok(false) }));
        mock.expect_create_auth_token().never();

        let svc = service(mock);
        let outcome = svc.login("sara", "wrong").await.unwrap();

        assert!(matches!(outcome, LoginOutcome::InvalidCredentials));
    }

    // ----- register tests -----

    #[tokio::test]
    async fn register_empty_fields_returns_empty_fields() {
        let svc = service(MockAuthRepository::new());
        let outcome = svc
            .register(&registration("", "password123", None))
            .await
            .unwrap();
        assert!(matches!(outcome, RegisterOutcome::EmptyFields));

        let svc = service(MockAuthRepository::new());
        let outcome = svc.register(&registration("sara", "", None)).await.unwrap();
        assert!(matches!(outcome, RegisterOutcome::EmptyFields));
    }

    #[tokio::test]
    async fn register_rejects_admin_and_unknown_roles() {
        for role in ["admin", "principal"] {
            let svc = service(MockAuthRepository::new());
            let outcome = svc
                .register(&registration("sara", "password123", Some(role)))
                .await
                .unwrap();
            assert!(matches!(outcome, RegisterOutcome::InvalidRole), "{role}");
        }
    }

    #[tokio::test]
    async fn register_short_password_returns_weak_password() {
        let svc = service(MockAuthRepository::new());
        let outcome = svc
            .register(&registration("sara", "short", None))
            .await
            .unwrap();
        assert!(matches!(outcome, RegisterOutcome::WeakPassword));
    }

    #[tokio::test]
    async fn register_username_taken_returns_username_taken() {
        let mut mock = MockAuthRepository::new();
        mock.expect_username_exists()
            .returning(|_| Box::pin(async { Ok(true) }));
        mock.expect_create_user().never();

        let svc = service(mock);
        let outcome = svc
            .register(&registration("sara", "password123", None))
            .await
            .unwrap();

        assert!(matches!(outcome, RegisterOutcome::UsernameTaken));
    }

    #[tokio::test]
    async fn register_defaults_to_student_role() {
        let mut mock = MockAuthRepository::new();
        mock.expect_username_exists()
            .returning(|_| Box::pin(async { Ok(false) }));
        mock.expect_create_user()
            .withf(|_, role| *role == Role::Student)
            .returning(|_, _| Box::pin(async { Ok(3) }));

        let svc = service(mock);
        let outcome = svc
            .register(&registration("sara", "password123", None))
            .await
            .unwrap();

        assert!(matches!(outcome, RegisterOutcome::Created(3)));
    }

    #[tokio::test]
    async fn register_accepts_teacher_role() {
        let mut mock = MockAuthRepository::new();
        mock.expect_username_exists()
            .returning(|_| Box::pin(async { Ok(false) }));
        mock.expect_create_user()
            .withf(|_, role| *role == Role::Teacher)
            .returning(|_, _| Box::pin(async { Ok(4) }));

        let svc = service(mock);
        let outcome = svc
            .register(&registration("reza", "password123", Some("teacher")))
            .await
            .unwrap();

        assert!(matches!(outcome, RegisterOutcome::Created(4)));
    }

    // ----- token tests -----

    #[tokio::test]
    async fn user_for_token_passes_configured_ttl() {
        let mut mock = MockAuthRepository::new();
        mock.expect_get_user_by_token()
            .withf(|token, ttl| token == "abc" && *ttl == 24)
            .returning(|_, _| Box::pin(async { Ok(None) }));

        let svc = AuthService::new(mock, 24);
        assert!(svc.user_for_token("abc").await.unwrap().is_none());
    }

    // ----- change password tests -----

    #[tokio::test]
    async fn change_password_empty_fields() {
        let svc = service(MockAuthRepository::new());
        let outcome = svc.change_password(1, "", "newpassword").await.unwrap();
        assert!(matches!(outcome, ChangePasswordOutcome::EmptyFields));
    }

    #[tokio::test]
    async fn change_password_weak_password() {
        let svc = service(MockAuthRepository::new());
        let outcome = svc.change_password(1, "current", "short").await.unwrap();
        assert!(matches!(outcome, ChangePasswordOutcome::WeakPassword));
    }

    #[tokio::test]
    async fn change_password_incorrect_current_password() {
        let mut mock = MockAuthRepository::new();
        mock.expect_change_password()
            .returning(|_, _, _| Box::pin(async { Ok(false) }));

        let svc = service(mock);
        let outcome = svc
            .change_password(1, "wrongcurrent", "newpassword")
            .await
            .unwrap();
        assert!(matches!(outcome, ChangePasswordOutcome::IncorrectPassword));
    }

    #[tokio::test]
    async fn change_password_success() {
        let mut mock = MockAuthRepository::new();
        mock.expect_change_password()
            .returning(|_, _, _| Box::pin(async { Ok(true) }));

        let svc = service(mock);
        let outcome = svc
            .change_password(1, "current", "newpassword")
            .await
            .unwrap();
        assert!(matches!(outcome, ChangePasswordOutcome::Success));
    }
}
