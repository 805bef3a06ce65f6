//! Policy publishing, acceptance, moderation and the audit trail
//!
//! Audit entries are written by a background worker, so the log is
//! polled rather than read immediately after the triggering request.

mod common;

use common::TestApp;
use http::StatusCode;
use serde_json::{Value, json};

/// Poll the audit log until `at_least` entries match the query
async fn wait_for_audit(app: &TestApp, admin: &str, query: &str, at_least: u64) -> Value {
    for _ in 0..100 {
        let (status, body) = app
            .get(&format!("/api/admin/audit-log?{query}"), Some(admin))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        if body["data"]["total"].as_u64().unwrap_or(0) >= at_least {
            return body["data"].clone();
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("audit log never reached {at_least} entries for {query}");
}

#[tokio::test]
async fn test_policy_versions_and_acceptance() {
    let app = TestApp::spawn().await;
    let admin = app.login_admin().await;

    let terms = json!({
        "slug": "terms-of-service",
        "version": 1,
        "title": "Terms of Service",
        "body": "You agree to the marketplace rules.",
    });
    let (status, body) = app.post("/api/admin/policies", Some(&admin), terms.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["version"], 1);

    // Re-publishing the same version is refused
    let (status, body) = app.post("/api/admin/policies", Some(&admin), terms).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .post(
            "/api/admin/policies",
            Some(&admin),
            json!({
                "slug": "terms-of-service",
                "version": 2,
                "title": "Terms of Service",
                "body": "You agree to the updated marketplace rules.",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let v2_id = body["data"]["id"].as_str().unwrap().to_string();

    // The catalog is public and carries only the latest version per slug
    let (status, body) = app.get("/api/policies", None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let policies = body["data"].as_array().unwrap();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0]["version"], 2);

    // Publishing is admin-only
    app.register("buyer_grace", "gracepass1", "buyer").await;
    let buyer = app.login("buyer_grace", "gracepass1").await;
    let (status, _) = app
        .post(
            "/api/admin/policies",
            Some(&buyer),
            json!({ "slug": "x", "version": 1, "title": "x", "body": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // First acceptance records, the second is a no-op
    let (status, body) = app
        .post_empty(&format!("/api/policies/{v2_id}/accept"), Some(&buyer))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Policy accepted");

    let (status, body) = app
        .post_empty(&format!("/api/policies/{v2_id}/accept"), Some(&buyer))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Policy was already accepted");

    let (status, body) = app.get("/api/policies/acceptances", Some(&buyer)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let acceptances = body["data"].as_array().unwrap();
    assert_eq!(acceptances.len(), 1);
    assert_eq!(acceptances[0]["slug"], "terms-of-service");
    assert_eq!(acceptances[0]["version"], 2);

    // The acceptance history is personal, not public
    let (status, _) = app.get("/api/policies/acceptances", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    app.shutdown().await;
}

#[tokio::test]
async fn test_listing_removal_expires_open_offers() {
    let app = TestApp::spawn().await;
    let (_seller, buyer, listing_id) = app.seed_marketplace(75.0).await;
    let admin = app.login_admin().await;

    let (status, body) = app
        .post(
            "/api/offers",
            Some(&buyer),
            json!({ "listing_id": listing_id, "amount": 60.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let offer_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post_empty(&format!("/api/admin/listings/{listing_id}/remove"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["listing"]["status"], "REMOVED");
    assert_eq!(body["data"]["expired_offers"], 1);

    // The open offer died with the listing
    let (status, body) = app.get(&format!("/api/offers/{offer_id}"), Some(&buyer)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "EXPIRED");

    // Gone from the public catalog, and closed to new offers
    let (status, body) = app.get("/api/listings", None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = app
        .post(
            "/api/offers",
            Some(&buyer),
            json!({ "listing_id": listing_id, "amount": 60.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    // Removing twice finds nothing to remove
    let (status, _) = app
        .post_empty(&format!("/api/admin/listings/{listing_id}/remove"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    app.shutdown().await;
}

#[tokio::test]
async fn test_audit_log_query_and_chain_verification() {
    let app = TestApp::spawn().await;
    let admin = app.login_admin().await;

    // The log is an admin surface
    app.register("buyer_henry", "henrypass1", "buyer").await;
    let buyer = app.login("buyer_henry", "henrypass1").await;
    let (status, body) = app.get("/api/admin/audit-log", Some(&buyer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
    assert_eq!(body["code"], "E2001");

    for version in [1, 2] {
        let (status, body) = app
            .post(
                "/api/admin/policies",
                Some(&admin),
                json!({
                    "slug": "privacy",
                    "version": version,
                    "title": "Privacy Policy",
                    "body": "We store what we must.",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    // Filtered query: both publications, stamped with the operator
    let page = wait_for_audit(&app, &admin, "action=policy_published", 2).await;
    assert_eq!(page["total"], 2);
    for item in page["items"].as_array().unwrap() {
        assert_eq!(item["action"], "policy_published");
        assert_eq!(item["resource_type"], "policy");
        assert_eq!(item["operator_name"], "admin");
        assert!(!item["curr_hash"].as_str().unwrap().is_empty());
    }

    // Registration and logins landed in the unfiltered log too
    let page = wait_for_audit(&app, &admin, "limit=100", 5).await;
    let total = page["total"].as_u64().unwrap();

    // End-to-end hash walk over everything written so far
    let (status, body) = app.get("/api/admin/audit-log/verify", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["chain_intact"], true);
    assert!(body["data"]["total_entries"].as_u64().unwrap() >= total);
    assert!(body["data"]["breaks"].as_array().unwrap().is_empty());
    app.shutdown().await;
}
