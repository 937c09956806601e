mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{TestApp, read_json};
use http_helpers::authed_request;

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn root_and_health_report_ok() {
    let app = TestApp::offline();
    for uri in ["/", "/v1/system/health"] {
        let response = app.send(get(uri)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(read_json(response).await["status"], "ok");
    }
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::offline();
    let response = app.send(get("/v1/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = read_json(response).await;
    assert!(doc["paths"]["/v1/auth/login"].is_object());
    assert!(doc["paths"]["/v1/app/documents/analyze/upload"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer"].is_object());
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let app = TestApp::offline();
    for uri in ["/v1/admin/users", "/v1/admin/users/me", "/v1/app/documents"] {
        let response = app.send(get(uri)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(read_json(response).await["code"], "UNAUTHORIZED");
    }

    let response = app
        .send(authed_request("GET", "/v1/admin/users/me", "not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = TestApp::offline();
    let response = app.send(get("/v1/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
