//! Server-rendered pages
//!
//! Tera templates are embedded from `templates/` at compile time.
//! - GET / - latest published blogs
//! - GET /blogs - paginated listing with title search
//! - GET /blogs/{id} - single blog, hidden blogs render the 404 page

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use rust_embed::RustEmbed;
use serde::Serialize;
use tera::{Context as TeraContext, Tera};

use crate::api::common::ListQuery;
use crate::api::middleware::{AppState, Viewer};
use crate::api::responses::BlogResponse;
use crate::services::{BlogServiceError, HOME_LATEST_COUNT};

const SITE_NAME: &str = "Inkpress";

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct PageTemplates;

/// Tera instance loaded with the embedded templates
pub struct PageRenderer {
    tera: Tera,
}

impl PageRenderer {
    pub fn new() -> Result<Self> {
        let mut templates: Vec<(String, String)> = Vec::new();
        for name in PageTemplates::iter() {
            let file = PageTemplates::get(&name)
                .with_context(|| format!("Embedded template disappeared: {}", name))?;
            let source = String::from_utf8(file.data.into_owned())
                .with_context(|| format!("Template is not UTF-8: {}", name))?;
            templates.push((name.into_owned(), source));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .context("Failed to load page templates")?;
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera
            .render(template, context)
            .with_context(|| format!("Failed to render {}", template))
    }

    pub fn template_names(&self) -> Vec<&str> {
        self.tera.get_template_names().collect()
    }
}

#[derive(Serialize)]
struct CurrentUser<'a> {
    username: &'a str,
    is_staff: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/blogs", get(blog_list))
        .route("/blogs/{id}", get(blog_detail))
}

fn base_context(viewer: &Viewer) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("site_name", SITE_NAME);
    if let Some(user) = viewer.0.as_ref() {
        context.insert(
            "current_user",
            &CurrentUser {
                username: &user.username,
                is_staff: user.actor().is_staff(),
            },
        );
    }
    context
}

fn render_page(
    state: &AppState,
    status: StatusCode,
    template: &str,
    context: &TeraContext,
) -> Response {
    match state.pages.render(template, context) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("{:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

fn error_page(state: &AppState, viewer: &Viewer, status: StatusCode, message: &str) -> Response {
    let mut context = base_context(viewer);
    context.insert("status", &status.as_u16());
    context.insert("message", message);
    render_page(state, status, "error.html", &context)
}

fn service_error_page(state: &AppState, viewer: &Viewer, err: BlogServiceError) -> Response {
    match err {
        BlogServiceError::NotFound => {
            error_page(state, viewer, StatusCode::NOT_FOUND, "Blog not found")
        }
        other => {
            tracing::error!("Page failed: {}", other);
            error_page(state, viewer, StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
        }
    }
}

/// GET /
async fn home(State(state): State<AppState>, viewer: Viewer) -> Response {
    let latest = match state.blog_service.latest_published(HOME_LATEST_COUNT).await {
        Ok(blogs) => blogs,
        Err(e) => return service_error_page(&state, &viewer, e),
    };
    let latest: Vec<BlogResponse> = latest.into_iter().map(BlogResponse::from).collect();

    let mut context = base_context(&viewer);
    context.insert("latest_blogs", &latest);
    render_page(&state, StatusCode::OK, "home.html", &context)
}

/// GET /blogs
async fn blog_list(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ListQuery>,
) -> Response {
    let actor = viewer.actor();
    let page = match state
        .blog_service
        .list_for(actor.as_ref(), query.q.clone(), &query.params())
        .await
    {
        Ok(page) => page,
        Err(e) => return service_error_page(&state, &viewer, e),
    };

    let mut context = base_context(&viewer);
    context.insert("page", &page.page);
    context.insert("total_pages", &page.total_pages());
    context.insert("has_next", &page.has_next());
    context.insert("has_prev", &page.has_prev());
    context.insert("query", query.q.as_deref().unwrap_or(""));
    let blogs: Vec<BlogResponse> = page.items.into_iter().map(BlogResponse::from).collect();
    context.insert("blogs", &blogs);
    render_page(&state, StatusCode::OK, "blog_list.html", &context)
}

/// GET /blogs/{id}
async fn blog_detail(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> Response {
    let actor = viewer.actor();
    let blog = match state.blog_service.get_visible(id, actor.as_ref()).await {
        Ok(blog) => blog,
        Err(e) => return service_error_page(&state, &viewer, e),
    };

    let author = match state.user_service.get_by_id(blog.author_id).await {
        Ok(user) => user.map(|u| u.username),
        Err(e) => {
            tracing::warn!(blog_id = id, "Failed to load blog author: {}", e);
            None
        }
    };

    let mut context = base_context(&viewer);
    context.insert("blog", &BlogResponse::from(blog));
    context.insert("author", &author);
    render_page(&state, StatusCode::OK, "blog_detail.html", &context)
}

/// Fallback for unknown page routes
pub async fn not_found(State(state): State<AppState>) -> Response {
    error_page(&state, &Viewer::default(), StatusCode::NOT_FOUND, "Page not found")
}
