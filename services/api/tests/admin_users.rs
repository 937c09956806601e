mod common;

use axum::http::StatusCode;
use common::{TestApp, read_json};
use http_helpers::{authed_json_request, authed_request};
use serde_json::json;
use tyr_api::model::UserStatus;
use tyr_authz::Role;

fn new_user(email: &str) -> serde_json::Value {
    json!({
        "first_name": "Grace",
        "last_name": "Hopper",
        "email": email,
        "password": "long-enough-pass",
        "role": "user",
    })
}

#[tokio::test]
async fn admin_manages_users_end_to_end() {
    let app = TestApp::offline();
    app.seed_user("admin@example.com", Role::Admin, UserStatus::Active)
        .await;
    let admin = app.access_token("admin@example.com").await;

    let response = app
        .send(authed_json_request(
            "POST",
            "/v1/admin/users",
            &admin,
            new_user("grace@example.com"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    assert_eq!(created["status"], "active");
    let id = created["id"].as_str().expect("id").to_string();

    let response = app
        .send(authed_json_request(
            "POST",
            "/v1/admin/users",
            &admin,
            new_user("GRACE@example.com"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["message"], "Email already existed");

    let response = app
        .send(authed_json_request(
            "PATCH",
            &format!("/v1/admin/users/{id}"),
            &admin,
            json!({"status": "blocked", "phone": "555"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json(response).await;
    assert_eq!(updated["status"], "blocked");
    assert_eq!(updated["phone"], "555");
    assert_eq!(updated["first_name"], "Grace");

    let response = app
        .send(authed_request("GET", "/v1/admin/users?search=hopper", &admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["total_count"], 1);

    let response = app
        .send(authed_request("DELETE", &format!("/v1/admin/users/{id}"), &admin))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(authed_request("GET", &format!("/v1/admin/users/{id}"), &admin))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["code"], "USER_NOTFOUND");
}

#[tokio::test]
async fn create_user_validates_role_and_password() {
    let app = TestApp::offline();
    app.seed_user("admin@example.com", Role::Admin, UserStatus::Active)
        .await;
    let admin = app.access_token("admin@example.com").await;

    let mut body = new_user("x@example.com");
    body["role"] = json!("root");
    let response = app
        .send(authed_json_request("POST", "/v1/admin/users", &admin, body))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = new_user("x@example.com");
    body["password"] = json!("short");
    let response = app
        .send(authed_json_request("POST", "/v1/admin/users", &admin, body))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn plain_users_read_but_cannot_write_users() {
    let app = TestApp::offline();
    let other = app
        .seed_user("other@example.com", Role::User, UserStatus::Active)
        .await;
    app.seed_user("ada@example.com", Role::User, UserStatus::Active)
        .await;
    let user = app.access_token("ada@example.com").await;

    let response = app.send(authed_request("GET", "/v1/admin/users", &user)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(authed_json_request(
            "POST",
            "/v1/admin/users",
            &user,
            new_user("grace@example.com"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(body["message"], "You don't have permission to perform this action");

    for method in ["PATCH", "DELETE"] {
        let response = app
            .send(authed_json_request(
                method,
                &format!("/v1/admin/users/{}", other.id),
                &user,
                json!({}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method}");
    }
}

#[tokio::test]
async fn session_administration_is_admin_only() {
    let app = TestApp::offline();
    app.seed_user("admin@example.com", Role::Admin, UserStatus::Active)
        .await;
    app.seed_user("ada@example.com", Role::User, UserStatus::Active)
        .await;
    let admin = app.access_token("admin@example.com").await;
    let user = app.access_token("ada@example.com").await;

    let response = app
        .send(authed_request("GET", "/v1/admin/sessions", &user))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(authed_request("GET", "/v1/admin/sessions", &admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = read_json(response).await;
    assert_eq!(page["total_count"], 2);
    assert!(page["data"][0].get("refresh_token").is_none());
    let session_id = page["data"][0]["id"].as_str().expect("id").to_string();

    let response = app
        .send(authed_request(
            "GET",
            &format!("/v1/admin/sessions/{session_id}"),
            &admin,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(authed_request(
            "DELETE",
            &format!("/v1/admin/sessions/{session_id}"),
            &admin,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(authed_request(
            "GET",
            &format!("/v1/admin/sessions/{session_id}"),
            &admin,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["code"], "SESSION_NOTFOUND");
}
