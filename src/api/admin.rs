//! Admin API endpoints
//!
//! Everything here sits behind `require_auth` and `require_admin`.
//! - GET /admin/dashboard - user and blog totals, recent blogs
//! - GET /admin/users - all accounts, newest first
//! - POST /admin/users/{id}/toggle-active
//! - POST /admin/users/{id}/role
//! - POST /admin/blogs/{id}/approve | reject

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, ListQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{BlogResponse, BlogStatsResponse, PageResponse, UserResponse};
use crate::models::{BlogAction, ListParams};

/// Recent blogs listed on the admin dashboard
const DASHBOARD_RECENT_BLOGS: u32 = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminDashboardResponse {
    pub total_users: i64,
    #[serde(flatten)]
    pub blogs: BlogStatsResponse,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_users_page_size")]
    pub page_size: u32,
}

fn default_users_page_size() -> u32 {
    20
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/{id}/toggle-active", post(toggle_active))
        .route("/users/{id}/role", post(change_role))
        .route("/blogs", get(list_all_blogs))
        .route("/blogs/{id}/approve", post(approve_blog))
        .route("/blogs/{id}/reject", post(reject_blog))
}

/// Admin dashboard payload, shared with the user dashboard for staff
pub async fn admin_dashboard(state: &AppState) -> Result<AdminDashboardResponse, ApiError> {
    let total_users = state.user_service.count_users().await?;
    let stats = state.blog_service.stats(DASHBOARD_RECENT_BLOGS).await?;
    Ok(AdminDashboardResponse {
        total_users,
        blogs: stats.into(),
    })
}

/// GET /api/v1/admin/dashboard
async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardResponse>, ApiError> {
    Ok(Json(admin_dashboard(&state).await?))
}

/// GET /api/v1/admin/users
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<PageResponse<UserResponse>>, ApiError> {
    let params = ListParams::new(query.page, query.page_size);
    let users = state.user_service.list_users(&params).await?;
    Ok(Json(PageResponse::from_paged(users)))
}

/// POST /api/v1/admin/users/{id}/toggle-active
async fn toggle_active(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.toggle_active(&admin.0, id).await?;
    Ok(Json(user.into()))
}

/// POST /api/v1/admin/users/{id}/role
async fn change_role(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.change_role(&admin.0, id, &body.role).await?;
    Ok(Json(user.into()))
}

/// GET /api/v1/admin/blogs - every blog regardless of status
async fn list_all_blogs(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageResponse<BlogResponse>>, ApiError> {
    let actor = admin.actor();
    let blogs = state
        .blog_service
        .list_for(Some(&actor), query.q.clone(), &query.params())
        .await?;
    Ok(Json(PageResponse::from_paged(blogs)))
}

/// POST /api/v1/admin/blogs/{id}/approve
async fn approve_blog(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<BlogResponse>, ApiError> {
    let blog = state
        .blog_service
        .transition(id, &admin.actor(), BlogAction::Publish)
        .await?;
    Ok(Json(blog.into()))
}

/// POST /api/v1/admin/blogs/{id}/reject
async fn reject_blog(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<BlogResponse>, ApiError> {
    let blog = state
        .blog_service
        .transition(id, &admin.actor(), BlogAction::Reject)
        .await?;
    Ok(Json(blog.into()))
}
