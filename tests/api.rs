//! End-to-end tests against the full router with an in-memory database.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use inkpress::api::{build_router, AppState};
use inkpress::config::Config;
use inkpress::db::{create_test_pool, migrations};

const ADMIN_PASSWORD: &str = "root-password-1";

struct TestApp {
    router: Router,
    _media: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let media = TempDir::new().unwrap();
        let mut config = Config::default();
        config.upload.path = media.path().to_path_buf();
        config.admin.username = Some("root".to_string());
        config.admin.password = Some(ADMIN_PASSWORD.to_string());

        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let state = AppState::build(&config, pool).unwrap();
        state.user_service.ensure_admin(&config.admin).await.unwrap();

        Self {
            router: build_router(state, &config).unwrap(),
            _media: media,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.send(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn raw(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = self
            .send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn page(&self, uri: &str) -> (StatusCode, String) {
        let (status, bytes) = self.raw(uri).await;
        (status, String::from_utf8(bytes).unwrap())
    }

    async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "a-long-password",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": "root", "password": ADMIN_PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_blog(&self, token: &str, title: &str) -> Value {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/v1/blogs",
                Some(token),
                Some(json!({ "title": title, "content": "Some words about it." })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

fn multipart_image(boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"cover.png\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(&PNG_SIGNATURE);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new().await;
    let (status, body) = app.json(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn categories_are_listed() {
    let app = TestApp::new().await;
    let (status, body) = app.json(Method::GET, "/api/v1/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 8);
    assert!(names.contains(&"Technology"));
    assert!(names.contains(&"General"));
}

#[tokio::test]
async fn register_sets_session_cookie() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "username": "ann",
                "email": "ann@example.com",
                "password": "a-long-password",
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let token = cookie
        .trim_start_matches("session=")
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let me = app
        .send(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header(header::COOKIE, format!("session={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = TestApp::new().await;
    app.register("ann").await;
    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "username": "ann",
                "email": "other@example.com",
                "password": "a-long-password",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = TestApp::new().await;
    let (status, _) = app.json(Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/blogs",
            Some("not-a-token"),
            Some(json!({ "title": "x", "content": "y" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new().await;
    let token = app.register("ann").await;

    let (status, _) = app.json(Method::POST, "/api/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json(Method::GET, "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn repeated_failed_logins_are_throttled() {
    let app = TestApp::new().await;
    app.register("ann").await;

    for _ in 0..5 {
        let (status, _) = app
            .json(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": "ann", "password": "wrong-password" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "ann", "password": "a-long-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["details"]["retry_after"], 900);
}

#[tokio::test]
async fn member_blog_waits_for_review() {
    let app = TestApp::new().await;
    let member = app.register("ann").await;
    let blog = app.create_blog(&member, "Pending post").await;
    let id = blog["id"].as_i64().unwrap();

    assert_eq!(blog["status"], "pending");
    assert_eq!(blog["category"], "General");
    assert_eq!(blog["approved_by"], Value::Null);

    // hidden from anonymous readers and other members
    let uri = format!("/api/v1/blogs/{}", id);
    let (status, _) = app.json(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let stranger = app.register("bob").await;
    let (status, _) = app.json(Method::GET, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the author still sees it
    let (status, body) = app.json(Method::GET, &uri, Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Pending post");

    // members cannot publish their own work
    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/blogs/{}/transition", id),
            Some(&member),
            Some(json!({ "action": "publish" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn staff_approval_publishes_blog() {
    let app = TestApp::new().await;
    let member = app.register("ann").await;
    let admin = app.admin_token().await;
    let id = app.create_blog(&member, "Review me").await["id"].as_i64().unwrap();

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/admin/blogs/{}/approve", id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "published");
    assert!(body["approved_by"].is_i64());
    assert!(body["approved_at"].is_string());

    let (status, body) = app.json(Method::GET, "/api/v1/blogs", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], id);

    let (status, html) = app.page("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Review me"));
}

#[tokio::test]
async fn staff_blogs_publish_immediately() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let blog = app.create_blog(&admin, "Announcement").await;
    assert_eq!(blog["status"], "published");
}

#[tokio::test]
async fn rejected_blog_stays_hidden() {
    let app = TestApp::new().await;
    let member = app.register("ann").await;
    let admin = app.admin_token().await;
    let id = app.create_blog(&member, "Not yet").await["id"].as_i64().unwrap();

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/admin/blogs/{}/reject", id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");

    let (status, _) = app.page(&format!("/blogs/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_author_or_staff_may_delete() {
    let app = TestApp::new().await;
    let member = app.register("ann").await;
    let stranger = app.register("bob").await;
    let admin = app.admin_token().await;
    let id = app.create_blog(&member, "Mine").await["id"].as_i64().unwrap();
    let uri = format!("/api/v1/blogs/{}", id);

    let (status, body) = app.json(Method::DELETE, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = app.json(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn author_edit_returns_blog_to_review() {
    let app = TestApp::new().await;
    let member = app.register("ann").await;
    let admin = app.admin_token().await;
    let id = app.create_blog(&member, "First take").await["id"].as_i64().unwrap();
    app.json(
        Method::POST,
        &format!("/api/v1/admin/blogs/{}/approve", id),
        Some(&admin),
        None,
    )
    .await;

    let (status, body) = app
        .json(
            Method::PUT,
            &format!("/api/v1/blogs/{}", id),
            Some(&member),
            Some(json!({ "title": "Second take", "status": "draft" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["title"], "Second take");
    assert_eq!(body["status"], "draft");
    assert_eq!(body["approved_by"], Value::Null);
}

#[tokio::test]
async fn member_edit_of_published_blog_needs_new_approval() {
    let app = TestApp::new().await;
    let member = app.register("ann").await;
    let admin = app.admin_token().await;
    let id = app.create_blog(&member, "Approved").await["id"].as_i64().unwrap();
    app.json(
        Method::POST,
        &format!("/api/v1/admin/blogs/{}/approve", id),
        Some(&admin),
        None,
    )
    .await;

    let uri = format!("/api/v1/blogs/{}", id);
    let (status, body) = app
        .json(
            Method::PUT,
            &uri,
            Some(&member),
            Some(json!({ "title": "Swapped", "content": "Changed after approval" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["approved_by"], Value::Null);
    assert_eq!(body["approved_at"], Value::Null);

    let (status, _) = app.json(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, list) = app.json(Method::GET, "/api/v1/blogs", None, None).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn blog_image_upload_is_served() {
    let app = TestApp::new().await;
    let member = app.register("ann").await;
    let id = app.create_blog(&member, "With cover").await["id"].as_i64().unwrap();

    let boundary = "inkpress-test-boundary";
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/v1/blogs/{}/image", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", member))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(multipart_image(boundary)))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    let url = body["image_url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/media/blog_images/"));
    assert!(url.ends_with(".png"));

    let (status, bytes) = app.raw(&url).await;
    assert_eq!(status, StatusCode::OK);
    assert!(bytes.starts_with(&PNG_SIGNATURE));
}

#[tokio::test]
async fn dashboard_lists_own_blogs() {
    let app = TestApp::new().await;
    let ann = app.register("ann").await;
    let bob = app.register("bob").await;
    app.create_blog(&ann, "Ann one").await;
    app.create_blog(&ann, "Ann two").await;
    app.create_blog(&bob, "Bob one").await;

    let (status, body) = app.json(Method::GET, "/api/v1/dashboard", Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "ann");
    assert_eq!(body["blogs"]["total"], 2);
    assert!(body.get("admin").is_none());

    let admin = app.admin_token().await;
    let (status, body) = app.json(Method::GET, "/api/v1/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["admin"]["total_users"], 3);
    assert_eq!(body["admin"]["total_blogs"], 3);
    assert_eq!(body["admin"]["by_status"]["pending"], 3);
}

#[tokio::test]
async fn admin_routes_reject_members() {
    let app = TestApp::new().await;
    let member = app.register("ann").await;
    let (status, _) = app
        .json(Method::GET, "/api/v1/admin/users", Some(&member), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_manages_accounts() {
    let app = TestApp::new().await;
    app.register("ann").await;
    let admin = app.admin_token().await;

    let (status, users) = app.json(Method::GET, "/api/v1/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users["total"], 2);
    let find = |name: &str| {
        users["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["username"] == name)
            .unwrap()["id"]
            .as_i64()
            .unwrap()
    };
    let ann_id = find("ann");
    let root_id = find("root");

    // an admin cannot lock themselves out
    let (status, _) = app
        .json(
            Method::POST,
            &format!("/api/v1/admin/users/{}/toggle-active", root_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/admin/users/{}/role", ann_id),
            Some(&admin),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    assert_eq!(body["is_staff"], true);

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/admin/users/{}/toggle-active", ann_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "ann", "password": "a-long-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_page_renders_not_found() {
    let app = TestApp::new().await;
    let (status, html) = app.page("/no/such/page").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(html.contains("Page not found"));
}
