use axum::http::{header::LOCATION, StatusCode};
use serde_json::json;
use tower::ServiceExt; // for oneshot
use wiremock::matchers::{body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "common.rs"]
mod common;

fn token_ok(access: &str, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": refresh,
        "scope": "user-top-read"
    }))
}

#[tokio::test]
async fn authorize_returns_url_and_sets_matching_handshake_cookies() {
    let app = common::build_test_app(common::test_config("http://127.0.0.1:9"));

    let res = app.router.oneshot(common::get("/api/auth/authorize", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let cookies = common::set_cookies(&res);
    let body = common::json_body(res).await;
    let state = body["state"].as_str().unwrap();
    let verifier = body["codeVerifier"].as_str().unwrap();
    let url = body["url"].as_str().unwrap();

    assert_eq!(common::decrypt(&cookies, "auth_state").as_deref(), Some(state));
    assert_eq!(common::decrypt(&cookies, "code_verifier").as_deref(), Some(verifier));

    let handshake = common::find(&cookies, "code_verifier").unwrap();
    assert_eq!(handshake.max_age(), Some(time::Duration::minutes(10)));
    assert_eq!(handshake.http_only(), Some(true));

    assert!(url.starts_with("http://127.0.0.1:9/authorize?"), "url was {}", url);
    assert!(url.contains("response_type=code"));
    assert!(url.contains("client_id=test-client"));
    assert!(url.contains("code_challenge_method=S256"));
    let challenge = roastify::auth::pkce::s256_challenge(verifier);
    assert!(url.contains(&format!("code_challenge={}", challenge)), "url was {}", url);
    assert!(url.contains(&format!("state={}", state)));
}

#[tokio::test]
async fn authorize_without_client_id_is_a_configuration_error() {
    let mut cfg = common::test_config("http://127.0.0.1:9");
    cfg.spotify.client_id = None;
    let app = common::build_test_app(cfg);

    let res = app.router.oneshot(common::get("/api/auth/authorize", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(common::set_cookies(&res).is_empty());
    let body = common::json_body(res).await;
    assert_eq!(body["error"], "missing_configuration");
}

#[tokio::test]
async fn login_redirects_to_provider() {
    let app = common::build_test_app(common::test_config("http://127.0.0.1:9"));

    let res = app.router.oneshot(common::get("/api/auth/login", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    let loc = res.headers().get(LOCATION).unwrap().to_str().unwrap();
    assert!(loc.starts_with("http://127.0.0.1:9/authorize"), "Location was: {}", loc);
}

#[tokio::test]
async fn token_exchange_writes_session_and_clears_handshake() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(header_exists("authorization"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=good-code"))
        .and(body_string_contains("code_verifier=verifier-123"))
        .respond_with(token_ok("acc-1", "ref-1"))
        .expect(1)
        .mount(&server)
        .await;

    let app = common::build_test_app(common::test_config(&server.uri()));
    let handshake = common::cookie_header(&[("code_verifier", "verifier-123"), ("auth_state", "st-1")]);
    let before = common::now();

    let res = app
        .router
        .oneshot(common::post_json(
            "/api/auth/token",
            Some(&handshake),
            &json!({ "code": "good-code", "state": "st-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let cookies = common::set_cookies(&res);
    let body = common::json_body(res).await;
    assert_eq!(body["success"], true);
    let expires_at = body["expiresAt"].as_i64().unwrap();
    assert!(expires_at >= before + 3540 && expires_at <= common::now() + 3540);

    assert_eq!(common::decrypt(&cookies, "access_token").as_deref(), Some("acc-1"));
    assert_eq!(common::decrypt(&cookies, "refresh_token").as_deref(), Some("ref-1"));
    assert_eq!(common::decrypt(&cookies, "token_expiry"), Some(expires_at.to_string()));
    assert_eq!(
        common::find(&cookies, "access_token").unwrap().max_age(),
        Some(time::Duration::seconds(3540))
    );
    assert_eq!(
        common::find(&cookies, "refresh_token").unwrap().max_age(),
        Some(time::Duration::days(30))
    );
    assert!(common::is_removed(&cookies, "code_verifier"));
    assert!(common::is_removed(&cookies, "auth_state"));
}

#[tokio::test]
async fn reused_code_is_relayed_from_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid authorization code"
        })))
        .mount(&server)
        .await;

    let app = common::build_test_app(common::test_config(&server.uri()));
    let handshake = common::cookie_header(&[("code_verifier", "verifier-123")]);

    let res = app
        .router
        .oneshot(common::post_json("/api/auth/token", Some(&handshake), &json!({ "code": "used-code" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let cookies = common::set_cookies(&res);
    assert!(common::find(&cookies, "access_token").is_none());
    let body = common::json_body(res).await;
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn state_mismatch_is_rejected_before_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(token_ok("acc-1", "ref-1"))
        .expect(0)
        .mount(&server)
        .await;

    let app = common::build_test_app(common::test_config(&server.uri()));
    let handshake = common::cookie_header(&[("code_verifier", "verifier-123"), ("auth_state", "st-1")]);

    let res = app
        .router
        .oneshot(common::post_json(
            "/api/auth/token",
            Some(&handshake),
            &json!({ "code": "good-code", "state": "forged" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::json_body(res).await["error"], "state_mismatch");
}

#[tokio::test]
async fn missing_code_and_missing_verifier_are_bad_requests() {
    let app = common::build_test_app(common::test_config("http://127.0.0.1:9"));

    let res = app
        .router
        .clone()
        .oneshot(common::post_json("/api/auth/token", None, &json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::json_body(res).await["error"], "missing_code");

    let res = app
        .router
        .oneshot(common::post_json("/api/auth/token", None, &json!({ "code": "good-code" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::json_body(res).await["error"], "auth_flow_interrupted");
}

#[tokio::test]
async fn client_supplied_verifier_is_used_when_cookie_is_lost() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("code_verifier=fallback-verifier"))
        .respond_with(token_ok("acc-1", "ref-1"))
        .expect(1)
        .mount(&server)
        .await;

    let app = common::build_test_app(common::test_config(&server.uri()));
    let res = app
        .router
        .oneshot(common::post_json(
            "/api/auth/token",
            None,
            &json!({ "code": "good-code", "state": "st-1", "codeVerifier": "fallback-verifier" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn callback_redirects_to_dashboard_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(token_ok("acc-1", "ref-1"))
        .mount(&server)
        .await;

    let app = common::build_test_app(common::test_config(&server.uri()));
    let handshake = common::cookie_header(&[("code_verifier", "verifier-123"), ("auth_state", "st-1")]);

    let res = app
        .router
        .oneshot(common::get("/api/auth/callback?code=good-code&state=st-1", Some(&handshake)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.headers().get(LOCATION).unwrap(), "/dashboard");
    let cookies = common::set_cookies(&res);
    assert_eq!(common::decrypt(&cookies, "access_token").as_deref(), Some("acc-1"));
}

#[tokio::test]
async fn callback_failures_redirect_home_with_error_code() {
    let app = common::build_test_app(common::test_config("http://127.0.0.1:9"));

    let res = app
        .router
        .clone()
        .oneshot(common::get("/api/auth/callback?error=access_denied&state=st-1", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.headers().get(LOCATION).unwrap(), "/?error=access_denied");

    let res = app
        .router
        .oneshot(common::get("/api/auth/callback?code=abc", None))
        .await
        .unwrap();
    assert_eq!(res.headers().get(LOCATION).unwrap(), "/?error=auth_flow_interrupted");
}

#[tokio::test]
async fn logout_clears_every_session_cookie() {
    let app = common::build_test_app(common::test_config("http://127.0.0.1:9"));
    let cookies = common::cookie_header(&[
        ("access_token", "acc-1"),
        ("refresh_token", "ref-1"),
        ("token_expiry", "1"),
        ("code_verifier", "v"),
        ("auth_state", "s"),
    ]);

    let res = app
        .router
        .oneshot(
            axum::http::Request::post("/api/auth/logout")
                .header(axum::http::header::COOKIE, cookies)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let set = common::set_cookies(&res);
    for name in ["access_token", "refresh_token", "token_expiry", "code_verifier", "auth_state"] {
        assert!(common::is_removed(&set, name), "{} was not cleared", name);
    }
}
