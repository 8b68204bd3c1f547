//! User service
//!
//! Account management and authentication:
//! - registration with unique username/email
//! - login/logout over server-side sessions
//! - profile and password changes
//! - admin moderation (activate/deactivate, role changes)
//! - bootstrap administrator from configuration

use crate::config::AdminBootstrapConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{ListParams, PagedResult, Session, UpdateProfileInput, User, UserRole};
use crate::services::password::{hash_password, password_problem, verify_password};
use anyhow::Context;
use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]{1,150}$").expect("valid username regex"));

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Unknown user or wrong password
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("This account is inactive")]
    AccountInactive,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    /// Actor lacks admin rights for the operation
    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_ttl: Duration,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_ttl: Duration::days(session_expiration_days),
        }
    }

    /// Session lifetime, used for the cookie Max-Age
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Register a new account with the `user` role.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a malformed username/email or a weak or mismatched password
    /// - `UserExists` if username or email is taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        validate_username(&username)?;
        validate_email(&email)?;
        if let Some(problem) = password_problem(&input.password, Some(&input.password_confirm)) {
            return Err(UserServiceError::ValidationError(problem));
        }

        self.ensure_username_free(&username, None).await?;
        self.ensure_email_free(&email, None).await?;

        let password_hash = hash_password(&input.password)?;
        let user = User::new(username, email, password_hash, UserRole::User);
        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, username = %created.username, "User registered");
        Ok(created)
    }

    /// Check credentials and open a session.
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to look up user")?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(invalid());
        }
        if !user.is_active {
            return Err(UserServiceError::AccountInactive);
        }

        let session = self.start_session(user.id).await?;
        tracing::debug!(user_id = user.id, "User logged in");
        Ok((session, user))
    }

    /// Open a session for an already authenticated user
    pub async fn start_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::issue(user_id, self.session_ttl);
        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }

    /// Delete the session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Expired sessions are deleted; inactive users resolve to `None`.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user.filter(|u| u.is_active))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Change username and/or email, keeping both unique
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get_by_id(user_id).await?.ok_or(UserServiceError::NotFound)?;

        if let Some(username) = input.username.map(|u| u.trim().to_string()) {
            validate_username(&username)?;
            self.ensure_username_free(&username, Some(user.id)).await?;
            user.username = username;
        }
        if let Some(email) = input.email.map(|e| e.trim().to_string()) {
            validate_email(&email)?;
            self.ensure_email_free(&email, Some(user.id)).await?;
            user.email = email;
        }

        Ok(self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update profile")?)
    }

    /// Replace the password after checking the current one
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let mut user = self.get_by_id(user_id).await?.ok_or(UserServiceError::NotFound)?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        if let Some(problem) = password_problem(new_password, None) {
            return Err(UserServiceError::ValidationError(problem));
        }

        user.password_hash = hash_password(new_password)?;
        self.user_repo
            .update(&user)
            .await
            .context("Failed to update password")?;
        Ok(())
    }

    /// Point the avatar at a stored file. Returns the updated user and the previous path.
    pub async fn set_profile_image(
        &self,
        user_id: i64,
        path: String,
    ) -> Result<(User, Option<String>), UserServiceError> {
        let mut user = self.get_by_id(user_id).await?.ok_or(UserServiceError::NotFound)?;
        let previous = user.profile_image.replace(path);
        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update profile image")?;
        Ok((updated, previous))
    }

    pub async fn count_users(&self) -> Result<i64, UserServiceError> {
        Ok(self.user_repo.count().await.context("Failed to count users")?)
    }

    /// All users, newest first
    pub async fn list_users(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let (users, total) = self
            .user_repo
            .list(i64::from(params.page), params.limit())
            .await
            .context("Failed to list users")?;
        Ok(PagedResult::new(users, total, params))
    }

    /// Flip a user's active flag.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless `admin` is an administrator
    /// - `ValidationError` when an admin targets their own account
    /// - `NotFound` for an unknown target
    pub async fn toggle_active(
        &self,
        admin: &User,
        target_id: i64,
    ) -> Result<User, UserServiceError> {
        require_admin(admin)?;
        if admin.id == target_id {
            return Err(UserServiceError::ValidationError(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let mut target = self.get_by_id(target_id).await?.ok_or(UserServiceError::NotFound)?;
        target.is_active = !target.is_active;
        let updated = self
            .user_repo
            .update(&target)
            .await
            .context("Failed to update user status")?;

        if !updated.is_active {
            let dropped = self
                .session_repo
                .delete_by_user(updated.id)
                .await
                .context("Failed to revoke sessions")?;
            tracing::debug!(
                user_id = updated.id,
                sessions = dropped,
                "Revoked sessions of deactivated user"
            );
        }

        tracing::info!(
            admin_id = admin.id,
            user_id = updated.id,
            active = updated.is_active,
            "User active flag changed"
        );
        Ok(updated)
    }

    /// Set a user's role; `is_staff` follows the role.
    pub async fn change_role(
        &self,
        admin: &User,
        target_id: i64,
        role: &str,
    ) -> Result<User, UserServiceError> {
        require_admin(admin)?;
        let role: UserRole = role
            .parse()
            .map_err(|_| UserServiceError::ValidationError(format!("Invalid role: {}", role)))?;

        let mut target = self.get_by_id(target_id).await?.ok_or(UserServiceError::NotFound)?;
        target.set_role(role);
        let updated = self
            .user_repo
            .update(&target)
            .await
            .context("Failed to update user role")?;

        tracing::info!(
            admin_id = admin.id,
            user_id = updated.id,
            role = %updated.role,
            "User role changed"
        );
        Ok(updated)
    }

    /// Create the configured administrator if it does not exist yet.
    ///
    /// Returns the new account, or `None` when nothing was configured or the
    /// username is already taken.
    pub async fn ensure_admin(
        &self,
        config: &AdminBootstrapConfig,
    ) -> Result<Option<User>, UserServiceError> {
        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Ok(None);
        };

        if self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check admin account")?
            .is_some()
        {
            return Ok(None);
        }

        let email = config
            .email
            .clone()
            .unwrap_or_else(|| format!("{}@localhost.localdomain", username));
        validate_username(username)?;
        validate_email(&email)?;

        let user = User::new(username.clone(), email, hash_password(password)?, UserRole::Admin);
        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create admin account")?;
        tracing::info!(username = %created.username, "Created bootstrap administrator");
        Ok(Some(created))
    }

    /// Delete expired sessions; returns how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn ensure_username_free(
        &self,
        username: &str,
        owner: Option<i64>,
    ) -> Result<(), UserServiceError> {
        let existing = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?;
        match existing {
            Some(u) if Some(u.id) != owner => Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            ))),
            _ => Ok(()),
        }
    }

    async fn ensure_email_free(
        &self,
        email: &str,
        owner: Option<i64>,
    ) -> Result<(), UserServiceError> {
        let existing = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        match existing {
            Some(u) if Some(u.id) != owner => Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            ))),
            _ => Ok(()),
        }
    }
}

fn require_admin(user: &User) -> Result<(), UserServiceError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(UserServiceError::Forbidden("Admin access required".to_string()))
    }
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(UserServiceError::ValidationError(
            "Username must be 1-150 characters: letters, digits and @/./+/-/_ only".to_string(),
        ))
    }
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if email.len() <= 254 && EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(UserServiceError::ValidationError("Enter a valid email address".to_string()))
    }
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl RegisterInput {
    /// Registration with a matching confirmation
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            username: username.into(),
            email: email.into(),
            password_confirm: password.clone(),
            password,
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    async fn admin(service: &UserService) -> User {
        let config = AdminBootstrapConfig {
            username: Some("root".to_string()),
            email: Some("root@example.com".to_string()),
            password: Some("rootpassword".to_string()),
        };
        service.ensure_admin(&config).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_register_creates_plain_user() {
        let service = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("alice", "alice@example.com", "wonderland"))
            .await
            .unwrap();
        assert_eq!(user.role, UserRole::User);
        assert!(!user.is_staff);
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let service = setup_test_service().await;
        service
            .register(RegisterInput::new("alice", "alice@example.com", "wonderland"))
            .await
            .unwrap();

        let same_name = service
            .register(RegisterInput::new("alice", "other@example.com", "wonderland"))
            .await;
        assert!(matches!(same_name, Err(UserServiceError::UserExists(_))));

        let same_email = service
            .register(RegisterInput::new("alice2", "ALICE@example.com", "wonderland"))
            .await;
        assert!(matches!(same_email, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = setup_test_service().await;

        let bad_name = service
            .register(RegisterInput::new("has space", "a@example.com", "wonderland"))
            .await;
        assert!(matches!(bad_name, Err(UserServiceError::ValidationError(_))));

        let bad_email = service
            .register(RegisterInput::new("bob", "not-an-email", "wonderland"))
            .await;
        assert!(matches!(bad_email, Err(UserServiceError::ValidationError(_))));

        let mut mismatch = RegisterInput::new("bob", "bob@example.com", "wonderland");
        mismatch.password_confirm = "wonderlanx".to_string();
        assert!(matches!(
            service.register(mismatch).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_login_and_session_validation() {
        let service = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("carol", "carol@example.com", "password99"))
            .await
            .unwrap();

        let (session, logged_in) = service
            .login(LoginInput::new("carol", "password99"))
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let resolved = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        service.logout(&session.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_unknown_user_look_alike() {
        let service = setup_test_service().await;
        service
            .register(RegisterInput::new("dave", "dave@example.com", "password99"))
            .await
            .unwrap();

        let wrong = service.login(LoginInput::new("dave", "nope-nope")).await.unwrap_err();
        let unknown = service.login(LoginInput::new("ghost", "password99")).await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            -1,
        );
        service
            .register(RegisterInput::new("erin", "erin@example.com", "password99"))
            .await
            .unwrap();
        let (session, _) = service.login(LoginInput::new("erin", "password99")).await.unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_login() {
        let service = setup_test_service().await;
        let root = admin(&service).await;
        let user = service
            .register(RegisterInput::new("frank", "frank@example.com", "password99"))
            .await
            .unwrap();
        let (session, _) = service.login(LoginInput::new("frank", "password99")).await.unwrap();

        let toggled = service.toggle_active(&root, user.id).await.unwrap();
        assert!(!toggled.is_active);

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(matches!(
            service.login(LoginInput::new("frank", "password99")).await,
            Err(UserServiceError::AccountInactive)
        ));

        let back = service.toggle_active(&root, user.id).await.unwrap();
        assert!(back.is_active);
    }

    #[tokio::test]
    async fn test_admin_cannot_deactivate_self() {
        let service = setup_test_service().await;
        let root = admin(&service).await;
        assert!(matches!(
            service.toggle_active(&root, root.id).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_moderate() {
        let service = setup_test_service().await;
        let root = admin(&service).await;
        let user = service
            .register(RegisterInput::new("gina", "gina@example.com", "password99"))
            .await
            .unwrap();

        assert!(matches!(
            service.toggle_active(&user, root.id).await,
            Err(UserServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.change_role(&user, user.id, "admin").await,
            Err(UserServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_change_role_syncs_staff() {
        let service = setup_test_service().await;
        let root = admin(&service).await;
        let user = service
            .register(RegisterInput::new("hank", "hank@example.com", "password99"))
            .await
            .unwrap();

        let promoted = service.change_role(&root, user.id, "admin").await.unwrap();
        assert_eq!(promoted.role, UserRole::Admin);
        assert!(promoted.is_staff);

        let demoted = service.change_role(&root, user.id, "user").await.unwrap();
        assert!(!demoted.is_staff);

        assert!(matches!(
            service.change_role(&root, user.id, "superuser").await,
            Err(UserServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.change_role(&root, 9999, "user").await,
            Err(UserServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_profile_and_password() {
        let service = setup_test_service().await;
        let a = service
            .register(RegisterInput::new("ivy", "ivy@example.com", "password99"))
            .await
            .unwrap();
        service
            .register(RegisterInput::new("jack", "jack@example.com", "password99"))
            .await
            .unwrap();

        let taken = service
            .update_profile(a.id, UpdateProfileInput { username: Some("jack".into()), email: None })
            .await;
        assert!(matches!(taken, Err(UserServiceError::UserExists(_))));

        let same = service
            .update_profile(
                a.id,
                UpdateProfileInput {
                    username: Some("ivy".into()),
                    email: Some("ivy2@example.com".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(same.email, "ivy2@example.com");

        assert!(matches!(
            service.change_password(a.id, "wrong-one", "newpassword").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
        service.change_password(a.id, "password99", "newpassword").await.unwrap();
        assert!(service.login(LoginInput::new("ivy", "newpassword")).await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let service = setup_test_service().await;
        let root = admin(&service).await;
        assert!(root.is_admin());
        assert!(root.is_staff);

        let config = AdminBootstrapConfig {
            username: Some("root".to_string()),
            email: None,
            password: Some("whatever".to_string()),
        };
        assert!(service.ensure_admin(&config).await.unwrap().is_none());
        assert!(service.ensure_admin(&AdminBootstrapConfig::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users_paginates() {
        let service = setup_test_service().await;
        for name in ["k1", "k2", "k3"] {
            service
                .register(RegisterInput::new(name, format!("{}@example.com", name), "password99"))
                .await
                .unwrap();
        }
        let page = service.list_users(&ListParams::new(1, 2)).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.has_next());
    }
}
