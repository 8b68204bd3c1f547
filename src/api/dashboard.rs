//! GET /api/v1/dashboard - the caller's own blogs, plus site stats for staff

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::admin::{admin_dashboard, AdminDashboardResponse};
use crate::api::common::ListQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{BlogResponse, PageResponse, UserResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub user: UserResponse,
    pub blogs: PageResponse<BlogResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminDashboardResponse>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let blogs = state
        .blog_service
        .author_blogs(user.0.id, &query.params())
        .await?;

    let admin = if user.actor().is_staff() {
        Some(admin_dashboard(&state).await?)
    } else {
        None
    };

    Ok(Json(DashboardResponse {
        user: user.0.into(),
        blogs: PageResponse::from_paged(blogs),
        admin,
    }))
}
