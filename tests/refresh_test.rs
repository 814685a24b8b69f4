use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt; // for oneshot
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "common.rs"]
mod common;

fn refresh_request(cookies: &str) -> Request<Body> {
    Request::post("/api/auth/refresh")
        .header(header::COOKIE, cookies)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn refresh_rewrites_access_token_and_keeps_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=ref-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "acc-2",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = common::build_test_app(common::test_config(&server.uri()));
    let res = app
        .router
        .oneshot(refresh_request(&common::session_cookies("acc-1", "ref-1", common::now() - 10)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let cookies = common::set_cookies(&res);
    assert_eq!(common::decrypt(&cookies, "access_token").as_deref(), Some("acc-2"));
    assert!(common::find(&cookies, "refresh_token").is_none());
    let body = common::json_body(res).await;
    assert_eq!(body["success"], true);
    assert!(body["expiresAt"].as_i64().unwrap() > common::now());
}

#[tokio::test]
async fn rotated_refresh_token_is_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "acc-2",
            "expires_in": 3600,
            "refresh_token": "ref-2"
        })))
        .mount(&server)
        .await;

    let app = common::build_test_app(common::test_config(&server.uri()));
    let res = app
        .router
        .oneshot(refresh_request(&common::session_cookies("acc-1", "ref-1", common::now() - 10)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookies = common::set_cookies(&res);
    assert_eq!(common::decrypt(&cookies, "refresh_token").as_deref(), Some("ref-2"));
}

#[tokio::test]
async fn rejected_refresh_token_forces_login_and_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Refresh token revoked"
        })))
        .mount(&server)
        .await;

    let app = common::build_test_app(common::test_config(&server.uri()));
    let res = app
        .router
        .oneshot(refresh_request(&common::session_cookies("acc-1", "ref-1", common::now() - 10)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let cookies = common::set_cookies(&res);
    for name in ["access_token", "refresh_token", "token_expiry"] {
        assert!(common::is_removed(&cookies, name), "{} was not cleared", name);
    }
    let body = common::json_body(res).await;
    assert_eq!(body["requiresLogin"], true);
    assert_eq!(body["error"], "requires_login");
}

#[tokio::test]
async fn transient_provider_failure_is_relayed_without_touching_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "error": "temporarily_unavailable" })))
        .mount(&server)
        .await;

    let app = common::build_test_app(common::test_config(&server.uri()));
    let res = app
        .router
        .oneshot(refresh_request(&common::session_cookies("acc-1", "ref-1", common::now() - 10)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(common::set_cookies(&res).is_empty());
    assert_eq!(common::json_body(res).await["error"], "temporarily_unavailable");
}

#[tokio::test]
async fn refresh_without_refresh_token_requires_login() {
    let app = common::build_test_app(common::test_config("http://127.0.0.1:9"));
    let res = app
        .router
        .oneshot(refresh_request(&common::cookie_header(&[("access_token", "acc-1")])))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let cookies = common::set_cookies(&res);
    assert!(common::is_removed(&cookies, "access_token"));
    assert!(common::decrypt(&cookies, "access_token").is_none());
    assert_eq!(common::json_body(res).await["requiresLogin"], true);
}

#[tokio::test]
async fn oversized_expires_in_is_capped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "acc-2",
            "expires_in": i64::MAX
        })))
        .mount(&server)
        .await;

    let app = common::build_test_app(common::test_config(&server.uri()));
    let res = app
        .router
        .oneshot(refresh_request(&common::session_cookies("acc-1", "ref-1", common::now() - 10)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let expires_at = common::json_body(res).await["expiresAt"].as_i64().unwrap();
    assert!(expires_at > common::now());
    assert!(expires_at <= common::now() + 24 * 60 * 60);
}
