//! Registration, login, TOTP enrollment and account suspension
//!
//! Login failures are deliberately uniform: unknown usernames, bad
//! passwords and burned recovery codes all produce the same response.

mod common;

use common::TestApp;
use http::StatusCode;
use market_server::auth::totp;
use market_server::utils::time::now_millis;
use serde_json::json;

#[tokio::test]
async fn test_register_validation_and_duplicates() {
    let app = TestApp::spawn().await;

    let user = app.register("buyer_alice", "alicepass1", "buyer").await;
    assert_eq!(user["username"], "buyer_alice");
    assert_eq!(user["role"], "buyer");
    assert_eq!(user["mfa_enabled"], false);

    // Usernames are unique
    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "username": "buyer_alice", "password": "alicepass1", "role": "buyer" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    // Password policy
    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "username": "buyer_bob", "password": "short", "role": "buyer" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "E0002");

    // Nobody self-registers as admin
    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "username": "wannabe_admin", "password": "longenough1", "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    app.shutdown().await;
}

#[tokio::test]
async fn test_login_rejections_are_uniform() {
    let app = TestApp::spawn().await;
    app.register("buyer_carol", "carolpass1", "buyer").await;

    // Unknown username: generic message, delayed response
    let started = std::time::Instant::now();
    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "ghost", "password": "carolpass1" }),
        )
        .await;
    assert!(started.elapsed() >= std::time::Duration::from_millis(500));
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["message"], "Invalid username or password");

    // Wrong password: byte-identical rejection
    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "buyer_carol", "password": "wrongpass1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["message"], "Invalid username or password");

    // Protected routes without a token
    let (status, body) = app.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");
    assert_eq!(body["code"], "E3001");
    app.shutdown().await;
}

#[tokio::test]
async fn test_mfa_enrollment_and_login() {
    let app = TestApp::spawn().await;
    app.register("seller_dave", "davepass11", "seller").await;
    let token = app.login("seller_dave", "davepass11").await;

    let (status, body) = app.post_empty("/api/auth/mfa/enroll", Some(&token)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let secret = body["data"]["secret"].as_str().unwrap().to_string();
    let uri = body["data"]["otpauth_uri"].as_str().unwrap();
    assert!(uri.starts_with("otpauth://totp/"), "{uri}");

    // A code outside the verify window is refused and MFA stays off
    let now_secs = now_millis() as u64 / 1000;
    let step = now_secs / 30;
    let window: Vec<String> = (step - 1..=step + 1)
        .map(|s| totp::code_at_step(&secret, s).expect("code"))
        .collect();
    let wrong = ["000000", "111111", "222222", "333333"]
        .into_iter()
        .find(|c| !window.contains(&c.to_string()))
        .expect("a code outside the window");
    let (status, body) = app
        .post("/api/auth/mfa/confirm", Some(&token), json!({ "code": wrong }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let code = totp::current_code(&secret, now_millis() as u64 / 1000).expect("code");
    let (status, body) = app
        .post("/api/auth/mfa/confirm", Some(&token), json!({ "code": code }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let recovery_codes = body["data"]["recovery_codes"].as_array().unwrap();
    assert_eq!(recovery_codes.len(), 8);

    // Enrollment is one-shot once active
    let (status, body) = app.post_empty("/api/auth/mfa/enroll", Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    // Password alone no longer logs in
    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "seller_dave", "password": "davepass11" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");
    assert_eq!(body["code"], "E3004");

    // Password plus a current code does
    let code = totp::current_code(&secret, now_millis() as u64 / 1000).expect("code");
    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "seller_dave", "password": "davepass11", "mfa_code": code }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["token"].as_str().is_some());
    assert_eq!(body["data"]["user"]["mfa_enabled"], true);
    app.shutdown().await;
}

#[tokio::test]
async fn test_recovery_codes_are_single_use() {
    let app = TestApp::spawn().await;
    app.register("buyer_erin", "erinpass11", "buyer").await;
    let token = app.login("buyer_erin", "erinpass11").await;

    let (_, body) = app.post_empty("/api/auth/mfa/enroll", Some(&token)).await;
    let secret = body["data"]["secret"].as_str().unwrap().to_string();
    let code = totp::current_code(&secret, now_millis() as u64 / 1000).expect("code");
    let (status, body) = app
        .post("/api/auth/mfa/confirm", Some(&token), json!({ "code": code }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let recovery: Vec<String> = body["data"]["recovery_codes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap().to_string())
        .collect();

    // A recovery code stands in for the authenticator once
    let login = json!({
        "username": "buyer_erin",
        "password": "erinpass11",
        "recovery_code": recovery[0],
    });
    let (status, body) = app.post("/api/auth/login", None, login.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // Burned: replaying it fails like any bad credential
    let (status, body) = app.post("/api/auth/login", None, login).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["message"], "Invalid username or password");

    // The rest of the batch is still good
    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({
                "username": "buyer_erin",
                "password": "erinpass11",
                "recovery_code": recovery[1],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    app.shutdown().await;
}

#[tokio::test]
async fn test_suspension_blocks_login() {
    let app = TestApp::spawn().await;
    let user = app.register("seller_frank", "frankpass1", "seller").await;
    let user_id = user["id"].as_str().unwrap().to_string();
    let admin = app.login_admin().await;

    // Moderation is admin-only
    let seller = app.login("seller_frank", "frankpass1").await;
    let (status, _) = app
        .post_empty(&format!("/api/admin/users/{user_id}/suspend"), Some(&seller))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post_empty(&format!("/api/admin/users/{user_id}/suspend"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "SUSPENDED");

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "seller_frank", "password": "frankpass1" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
    assert_eq!(body["message"], "Account suspended");

    // Admins cannot suspend each other
    let (status, body) = app.get("/api/auth/me", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let admin_id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = app
        .post_empty(&format!("/api/admin/users/{admin_id}/suspend"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    // Reinstatement restores access
    let (status, body) = app
        .post_empty(&format!("/api/admin/users/{user_id}/reinstate"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "ACTIVE");
    app.login("seller_frank", "frankpass1").await;
    app.shutdown().await;
}
