mod common;

use access_service::models::{Action, Role};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{send, TestApp};
use serde_json::json;
use tower::util::ServiceExt;

#[tokio::test]
async fn health_reports_store_status() {
    let app = TestApp::new();

    let (status, body) = send(app.router(), Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "access-service-test");
    assert_eq!(body["checks"]["database"], "up");
}

#[tokio::test]
async fn request_id_is_echoed_or_minted() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-42");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    let minted = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(minted).is_ok());
}

#[tokio::test]
async fn missing_or_malformed_user_id_is_unauthorized() {
    let app = TestApp::new();

    let (status, _) = send(app.router(), Method::GET, "/modules", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        app.router(),
        Method::GET,
        "/modules",
        Some("not-a-uuid"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn denied_requests_get_a_generic_forbidden() {
    let app = TestApp::new();
    app.portal().await;
    let user = app.user(Role::User).await.to_string();

    let (status, body) = send(
        app.router(),
        Method::GET,
        "/permissions",
        Some(&user),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "Forbidden" }));
}

#[tokio::test]
async fn granted_read_lists_the_catalog() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let moderator = app.user(Role::Moderator).await;
    app.grant(moderator, portal.id("modules.access"), &[Action::Read])
        .await;
    let caller = moderator.to_string();

    let (status, body) = send(app.router(), Method::GET, "/modules", Some(&caller), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), portal.modules.len());

    // READ does not imply CREATE.
    let (status, _) = send(
        app.router(),
        Method::POST,
        "/modules",
        Some(&caller),
        Some(json!({ "name": "Reports", "slug": "reports" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_slug_is_a_bad_request() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let root = portal.actor.to_string();

    let (status, body) = send(
        app.router(),
        Method::POST,
        "/modules",
        Some(&root),
        Some(json!({ "name": "Dashboard again", "slug": "dashboard" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("dashboard"));
}

#[tokio::test]
async fn create_module_returns_created() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let root = portal.actor.to_string();

    let (status, body) = send(
        app.router(),
        Method::POST,
        "/modules",
        Some(&root),
        Some(json!({ "name": "Reports", "slug": "reports", "sort_order": 20 })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["slug"], "reports");
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn bulk_update_applies_to_role_holders() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let articles = portal.id("articles.access");
    let first = app.user(Role::Moderator).await;
    let second = app.user(Role::Moderator).await;
    let root = portal.actor.to_string();

    let (status, body) = send(
        app.router(),
        Method::POST,
        "/permissions/bulk-update",
        Some(&root),
        Some(json!({
            "changes": [
                { "role": "MODERATOR", "permission_id": articles, "actions": ["READ", "UPDATE"] }
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], 2);
    assert_eq!(body["failed"], 0);
    assert!(app.actions_of(first, articles).await.is_some());
    assert!(app.actions_of(second, articles).await.is_some());
}

#[tokio::test]
async fn invalid_bulk_update_is_unprocessable() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let root = portal.actor.to_string();
    let dashboard = portal.id("dashboard.access");

    for changes in [
        json!([{ "role": "OWNER", "permission_id": dashboard, "actions": ["READ"] }]),
        json!([{ "role": "USER", "permission_id": dashboard, "actions": ["APPROVE"] }]),
        json!([{ "role": "USER", "permission_id": dashboard, "actions": ["DELETE"] }]),
        json!([{ "role": "SUPER_ADMIN", "permission_id": dashboard, "actions": ["READ"] }]),
        json!([]),
    ] {
        let (status, body) = send(
            app.router(),
            Method::POST,
            "/permissions/bulk-update",
            Some(&root),
            Some(json!({ "changes": changes })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", changes);
        assert_eq!(body["error"], "Validation error");
    }
}

#[tokio::test]
async fn grant_endpoints_set_and_revoke() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let root = portal.actor.to_string();
    let user = app.user(Role::User).await;
    let uri = format!("/users/{}/permissions/{}", user, portal.id("settings.access"));

    let (status, body) = send(
        app.router(),
        Method::PUT,
        &uri,
        Some(&root),
        Some(json!({ "actions": ["READ"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["actions"], json!(["READ"]));

    let (status, body) = send(
        app.router(),
        Method::GET,
        &format!("/users/{}/permissions", user),
        Some(&root),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["code"], "settings.access");

    let (status, _) = send(app.router(), Method::DELETE, &uri, Some(&root), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(app.router(), Method::DELETE, &uri, Some(&root), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn check_endpoint_answers_for_the_caller() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let user = app.user(Role::User).await;
    app.grant(user, portal.id("dashboard.access"), &[Action::Read])
        .await;
    let caller = user.to_string();

    let (status, body) = send(
        app.router(),
        Method::POST,
        "/authz/check",
        Some(&caller),
        Some(json!({ "permission_code": "dashboard.access", "action": "READ" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);

    let (_, body) = send(
        app.router(),
        Method::POST,
        "/authz/check",
        Some(&caller),
        Some(json!({ "permission_code": "dashboard.access", "action": "EXPORT" })),
    )
    .await;
    assert_eq!(body["allowed"], false);

    let (status, _) = send(
        app.router(),
        Method::POST,
        "/authz/check",
        Some(&caller),
        Some(json!({ "permission_code": "dashboard.access", "action": "FLY" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn my_permissions_lists_effective_grants() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let user = app.user(Role::User).await;
    app.grant(user, portal.id("settings.access"), &[Action::Read, Action::Update])
        .await;

    let (status, body) = send(
        app.router(),
        Method::GET,
        "/me/permissions",
        Some(&user.to_string()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "USER");
    assert_eq!(
        body["permissions"],
        json!([{ "code": "settings.access", "actions": ["READ", "UPDATE"] }])
    );
}

#[tokio::test]
async fn creating_a_super_admin_requires_a_super_admin() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let admin = app.user(Role::Admin).await;
    app.grant(admin, portal.id("users.access"), &[Action::Create])
        .await;

    let request = json!({
        "email": "root@example.org",
        "display_name": "Another Root",
        "role": "SUPER_ADMIN"
    });

    let (status, _) = send(
        app.router(),
        Method::POST,
        "/users",
        Some(&admin.to_string()),
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        app.router(),
        Method::POST,
        "/users",
        Some(&portal.actor.to_string()),
        Some(request),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "SUPER_ADMIN");
    assert_eq!(body["seeded"]["written"], json!([]));
}
