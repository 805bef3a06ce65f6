//! Shared test harness
//!
//! Spins up the full application (state, middleware, background workers)
//! against a throwaway database and drives it in memory through tower's
//! oneshot, so tests exercise the same stack a real client hits, without
//! binding a port.

#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, to_bytes};
use http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use market_server::api::build_app;
use market_server::core::BackgroundTasks;
use market_server::{Config, ServerState};

pub struct TestApp {
    pub router: Router,
    pub state: ServerState,
    // Keeps the audit writer and job scheduler alive for the test's lifetime
    tasks: BackgroundTasks,
    // Dropped last; removes the database
    _work_dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let work_dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::with_overrides(work_dir.path().to_string_lossy().to_string(), 0);

        let state = ServerState::initialize(&config)
            .await
            .expect("initialize server state");

        let mut tasks = BackgroundTasks::new();
        state.start_background_tasks(&mut tasks);

        let router = build_app(&state).with_state(state.clone());

        Self {
            router,
            state,
            tasks,
            _work_dir: work_dir,
        }
    }

    /// Send a request and return (status, parsed JSON body)
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("build request"),
            None => builder.body(Body::empty()).expect("build request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("dispatch request");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse response body")
        };

        (status, json)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("GET", path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("POST", path, token, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("POST", path, token, None).await
    }

    /// Register an account, panicking on failure
    pub async fn register(&self, username: &str, password: &str, role: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({ "username": username, "password": password, "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["data"].clone()
    }

    /// Log in and return the bearer token
    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/login",
                None,
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"]["token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }

    /// Token for the bootstrap admin account
    pub async fn login_admin(&self) -> String {
        let username = self.state.config.admin_username.clone();
        let password = self.state.config.admin_password.clone();
        self.login(&username, &password).await
    }

    /// Register seller + buyer, publish a listing, return (seller_token,
    /// buyer_token, listing_id)
    pub async fn seed_marketplace(&self, price: f64) -> (String, String, String) {
        self.register("seller_jane", "sellerpass1", "seller").await;
        self.register("buyer_john", "buyerpass1", "buyer").await;
        let seller = self.login("seller_jane", "sellerpass1").await;
        let buyer = self.login("buyer_john", "buyerpass1").await;

        let (status, body) = self
            .post(
                "/api/listings",
                Some(&seller),
                json!({ "title": "Vintage road bike", "description": "Steel frame, recently serviced", "price": price }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "listing failed: {body}");
        let listing_id = body["data"]["id"].as_str().expect("listing id").to_string();

        (seller, buyer, listing_id)
    }

    /// Count scheduled follow-up jobs of one kind for one entity
    pub async fn job_count(&self, kind: &str, entity_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM scheduled_job WHERE kind = ?1 AND entity_id = ?2")
            .bind(kind)
            .bind(entity_id)
            .fetch_one(&self.state.pool)
            .await
            .expect("count scheduled jobs")
    }

    /// Drain the background workers so buffered audit entries are on disk
    pub async fn shutdown(self) {
        self.tasks.shutdown().await;
    }
}
