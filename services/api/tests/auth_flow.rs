mod common;

use axum::http::StatusCode;
use common::{PASSWORD, TestApp, read_json};
use http_helpers::{authed_json_request, authed_request, json_request};
use serde_json::json;
use tyr_api::model::UserStatus;
use tyr_authz::Role;

fn signup_body(email: &str) -> serde_json::Value {
    json!({
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email": email,
        "phone": "0123456789",
        "password": "secret1",
    })
}

#[tokio::test]
async fn signup_issues_tokens_and_rejects_duplicates() {
    let app = TestApp::offline();
    let response = app
        .send(json_request("POST", "/v1/auth/signup", signup_body("Ada@Example.com ")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = read_json(response).await;
    assert_eq!(tokens["token_type"], "bearer");
    assert_eq!(tokens["expires_in"], 300);
    let access = tokens["access_token"].as_str().expect("access");

    let response = app.send(authed_request("GET", "/v1/admin/users/me", access)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = read_json(response).await;
    assert_eq!(me["email"], "ada@example.com");
    assert_eq!(me["role"], "user");
    assert!(me.get("password_hash").is_none());

    let response = app
        .send(json_request("POST", "/v1/auth/signup", signup_body("ada@example.com")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["message"], "User already existed");
}

#[tokio::test]
async fn signup_requires_short_phone() {
    let app = TestApp::offline();
    let mut body = signup_body("grace@example.com");
    body["phone"] = json!("012345678901");
    let response = app.send(json_request("POST", "/v1/auth/signup", body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn login_normalizes_email_and_accepts_username() {
    let app = TestApp::offline();
    app.seed_user("ada@example.com", Role::User, UserStatus::Active)
        .await;

    let response = app
        .send(json_request(
            "POST",
            "/v1/auth/login",
            json!({"email": "  ADA@example.com", "password": PASSWORD, "grant_type": "portal"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(json_request(
            "POST",
            "/v1/auth/login",
            json!({"username": "ada@example.com", "password": PASSWORD, "grant_type": "app"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_failures_do_not_reveal_which_part_was_wrong() {
    let app = TestApp::offline();
    app.seed_user("ada@example.com", Role::User, UserStatus::Active)
        .await;
    app.seed_user("blocked@example.com", Role::User, UserStatus::Blocked)
        .await;

    for (email, password) in [
        ("ada@example.com", "wrong-password"),
        ("nobody@example.com", PASSWORD),
    ] {
        let response = app
            .send(json_request(
                "POST",
                "/v1/auth/login",
                json!({"email": email, "password": password, "grant_type": "app"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
        assert_eq!(body["message"], "Email or password is incorrect");
    }

    let response = app
        .send(json_request(
            "POST",
            "/v1/auth/login",
            json!({"email": "blocked@example.com", "password": PASSWORD, "grant_type": "app"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["code"], "USER_BLOCKED");

    let response = app
        .send(json_request(
            "POST",
            "/v1/auth/login",
            json!({"email": "ada@example.com", "password": PASSWORD, "grant_type": "password"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "INVALID_GRANT_TYPE");
}

#[tokio::test]
async fn refresh_rotates_and_rejects_the_previous_token() {
    let app = TestApp::offline();
    app.seed_user("ada@example.com", Role::User, UserStatus::Active)
        .await;
    let tokens = app.login("ada@example.com").await;
    let first = tokens["refresh_token"].as_str().expect("refresh").to_string();

    let response = app
        .send(json_request(
            "POST",
            "/v1/auth/refresh-token",
            json!({"refresh_token": first}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = read_json(response).await;
    let second = rotated["refresh_token"].as_str().expect("refresh");
    assert_ne!(second, first);

    let response = app
        .send(authed_request(
            "GET",
            "/v1/admin/users/me",
            rotated["access_token"].as_str().expect("access"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(json_request(
            "POST",
            "/v1/auth/refresh-token",
            json!({"refresh_token": first}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["code"], "INVALID_REFRESH_TOKEN");

    let response = app
        .send(json_request(
            "POST",
            "/v1/auth/refresh-token",
            json!({"refresh_token": "garbage"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn blocked_session_cannot_refresh() {
    let app = TestApp::offline();
    let user = app
        .seed_user("ada@example.com", Role::User, UserStatus::Active)
        .await;
    app.seed_user("admin@example.com", Role::Admin, UserStatus::Active)
        .await;
    let refresh = app.login("ada@example.com").await["refresh_token"]
        .as_str()
        .expect("refresh")
        .to_string();
    let admin = app.access_token("admin@example.com").await;

    let response = app
        .send(authed_request(
            "GET",
            &format!("/v1/admin/sessions?user_id={}", user.id),
            &admin,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let sessions = read_json(response).await;
    assert_eq!(sessions["total_count"], 1);
    let session_id = sessions["data"][0]["id"].as_str().expect("session id");

    let response = app
        .send(authed_json_request(
            "PATCH",
            &format!("/v1/admin/sessions/{session_id}"),
            &admin,
            json!({"is_blocked": true}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["is_blocked"], true);

    let response = app
        .send(json_request(
            "POST",
            "/v1/auth/refresh-token",
            json!({"refresh_token": refresh}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_checks_the_old_one() {
    let app = TestApp::offline();
    app.seed_user("ada@example.com", Role::User, UserStatus::Active)
        .await;
    let access = app.access_token("ada@example.com").await;

    let response = app
        .send(authed_json_request(
            "PATCH",
            "/v1/admin/users/me/password",
            &access,
            json!({
                "old_password": "not-it",
                "new_password": "brand-new-pass",
                "new_password_confirm": "brand-new-pass",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "INCORRECT_PASSWORD");

    let response = app
        .send(authed_json_request(
            "PATCH",
            "/v1/admin/users/me/password",
            &access,
            json!({
                "old_password": PASSWORD,
                "new_password": "brand-new-pass",
                "new_password_confirm": "brand-new-pass",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(json_request(
            "POST",
            "/v1/auth/login",
            json!({"email": "ada@example.com", "password": "brand-new-pass", "grant_type": "app"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}
