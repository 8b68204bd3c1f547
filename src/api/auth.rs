//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - create an account and log it in
//! - POST /api/v1/auth/login - open a session
//! - POST /api/v1/auth/logout - close the session
//! - GET /api/v1/auth/me - current user
//! - PUT /api/v1/auth/profile - change username/email
//! - PUT /api/v1/auth/password - change password
//! - POST /api/v1/auth/profile/image - upload an avatar

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::api::common::read_file_field;
use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::UserResponse;
use crate::models::{Session, UpdateProfileInput};
use crate::services::user::{LoginInput, RegisterInput, UserServiceError};
use crate::services::MediaKind;

/// Seconds a username stays locked after too many failures
const USERNAME_RETRY_AFTER_SECS: u64 = 15 * 60;
const IP_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Defaults to `password` when omitted
    #[serde(default)]
    pub password_confirm: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Routes that need no session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
        .route("/profile/image", post(upload_profile_image))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = RegisterInput {
        password_confirm: body.password_confirm.unwrap_or_else(|| body.password.clone()),
        username: body.username,
        email: body.email,
        password: body.password,
    };

    let user = state.user_service.register(input).await?;
    let session = state.user_service.start_session(user.id).await?;

    Ok((
        StatusCode::CREATED,
        session_cookie_headers(&session, &state)?,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(ip) = client_ip(&headers) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login rate limit hit for client IP");
            return Err(ApiError::rate_limited(
                "Too many requests, please try again later",
                IP_RETRY_AFTER_SECS,
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state.rate_limiter.is_username_limited(&body.username).await {
        tracing::warn!(username = %body.username, "Login rate limit hit for username");
        return Err(ApiError::rate_limited(
            "Too many failed login attempts, please try again in 15 minutes",
            USERNAME_RETRY_AFTER_SECS,
        ));
    }

    let input = LoginInput::new(body.username.clone(), body.password);
    let (session, user) = match state.user_service.login(input).await {
        Ok(pair) => pair,
        Err(e @ (UserServiceError::AuthenticationError(_) | UserServiceError::AccountInactive)) => {
            state.rate_limiter.record_failed_attempt(&body.username).await;
            tracing::info!(username = %body.username, "Login failed: {}", e);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    state.rate_limiter.clear_username_attempts(&body.username).await;

    Ok((
        session_cookie_headers(&session, &state)?,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.user_service.logout(&token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.user_service.update_profile(user.0.id, body).await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .change_password(user.0.id, &body.current_password, &body.new_password)
        .await
        .map_err(|e| match e {
            // a wrong current password is a form error, not a lost session
            UserServiceError::AuthenticationError(msg) => ApiError::validation_error(msg),
            other => other.into(),
        })?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/auth/profile/image
async fn upload_profile_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let file = read_file_field(&mut multipart).await?;
    let relative = state
        .media
        .save(MediaKind::ProfileImage, &file.content_type, &file.data)
        .await?;

    let stored = state
        .user_service
        .set_profile_image(user.0.id, relative.clone())
        .await;
    let (updated, previous) = match stored {
        Ok(result) => result,
        Err(e) => {
            state.media.remove(&relative).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = previous {
        state.media.remove(&previous).await;
    }
    Ok(Json(updated.into()))
}

fn session_cookie_headers(session: &Session, state: &AppState) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id,
        state.user_service.session_ttl().num_seconds()
    );
    let value = HeaderValue::from_str(&cookie)
        .map_err(|_| ApiError::internal_error("Failed to build session cookie"))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

/// Client address as reported by a reverse proxy
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next());
    let real_ip = headers.get("x-real-ip").and_then(|h| h.to_str().ok());

    forwarded
        .or(real_ip)
        .and_then(|ip| ip.trim().parse().ok())
}
