//! Blog API endpoints
//!
//! Reads go through [`Viewer`] so drafts stay hidden from strangers; writes
//! need a session and are checked by the blog service.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{read_file_field, ListQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
use crate::api::responses::{BlogResponse, PageResponse};
use crate::models::{BlogAction, BlogCategory, CreateBlogInput, UpdateBlogInput};
use crate::services::MediaKind;

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub action: BlogAction,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub name: &'static str,
}

/// Readable without a session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/blogs", get(list_blogs))
        .route("/blogs/{id}", get(get_blog))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/blogs", post(create_blog))
        .route("/blogs/{id}", axum::routing::put(update_blog).delete(delete_blog))
        .route("/blogs/{id}/transition", post(transition_blog))
        .route("/blogs/{id}/image", post(upload_blog_image))
}

/// GET /api/v1/blogs
async fn list_blogs(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageResponse<BlogResponse>>, ApiError> {
    let actor = viewer.actor();
    let result = state
        .blog_service
        .list_for(actor.as_ref(), query.q.clone(), &query.params())
        .await?;
    Ok(Json(PageResponse::from_paged(result)))
}

/// GET /api/v1/blogs/{id}
async fn get_blog(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> Result<Json<BlogResponse>, ApiError> {
    let actor = viewer.actor();
    let blog = state.blog_service.get_visible(id, actor.as_ref()).await?;
    Ok(Json(blog.into()))
}

/// POST /api/v1/blogs
async fn create_blog(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateBlogInput>,
) -> Result<(StatusCode, Json<BlogResponse>), ApiError> {
    let blog = state.blog_service.create(&user.actor(), body).await?;
    Ok((StatusCode::CREATED, Json(blog.into())))
}

/// PUT /api/v1/blogs/{id}
async fn update_blog(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBlogInput>,
) -> Result<Json<BlogResponse>, ApiError> {
    let blog = state.blog_service.update(id, &user.actor(), body).await?;
    Ok(Json(blog.into()))
}

/// POST /api/v1/blogs/{id}/transition
async fn transition_blog(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<BlogResponse>, ApiError> {
    let blog = state
        .blog_service
        .transition(id, &user.actor(), body.action)
        .await?;
    Ok(Json(blog.into()))
}

/// DELETE /api/v1/blogs/{id}
async fn delete_blog(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog_service.delete(id, &user.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/blogs/{id}/image
async fn upload_blog_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<BlogResponse>, ApiError> {
    let actor = user.actor();
    state.blog_service.get_editable(id, &actor).await?;

    let file = read_file_field(&mut multipart).await?;
    let relative = state
        .media
        .save(MediaKind::BlogImage, &file.content_type, &file.data)
        .await?;

    match state.blog_service.set_image(id, &actor, relative.clone()).await {
        Ok(blog) => Ok(Json(blog.into())),
        Err(e) => {
            state.media.remove(&relative).await;
            Err(e.into())
        }
    }
}

/// GET /api/v1/categories
pub async fn list_categories() -> Json<Vec<CategoryResponse>> {
    Json(
        BlogCategory::ALL
            .iter()
            .map(|c| CategoryResponse { name: c.as_str() })
            .collect(),
    )
}
