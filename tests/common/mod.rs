#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use achievement_api::auth::{generate_jwt, Claims};
use achievement_api::config::AppConfig;
use achievement_api::services::Actor;
use achievement_api::testing::TestContext;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const BOUNDARY: &str = "----achievement-test-boundary";

/// Router over in-memory stores plus helpers for driving it in-process
pub struct TestApp {
    pub ctx: TestContext,
    pub config: AppConfig,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let mut config = AppConfig::development();
        config.security.jwt_secret = JWT_SECRET.to_string();
        config.api.enable_request_logging = false;
        config.api.upload_dir = std::env::temp_dir()
            .join(format!("achievement-api-test-{}", Uuid::new_v4().simple()))
            .to_string_lossy()
            .into_owned();

        let ctx = TestContext::new();
        let router = achievement_api::app(ctx.state(config.clone()));
        Self { ctx, config, router }
    }

    pub fn token(&self, actor: Actor) -> String {
        let claims = Claims::new(actor.user_id, "user@kampus.ac.id", actor.role_id, 1);
        generate_jwt(&claims, JWT_SECRET).expect("mint test token")
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("router call failed")?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| {
                format!("non-JSON body ({}): {}", status, String::from_utf8_lossy(&bytes))
            })?
        };
        Ok((status, body))
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        actor: Option<Actor>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(actor)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn upload(
        &self,
        document_id: &str,
        actor: Actor,
        file_name: &str,
        contents: &[u8],
    ) -> Result<(StatusCode, Value)> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/achievements/{}/attachments", document_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token(actor)))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))?;
        self.send(request).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.config.api.upload_dir);
    }
}

/// The sample payload used across scenarios
pub fn deans_list() -> Value {
    serde_json::json!({
        "achievement_type": "academic",
        "title": "Dean's List",
        "description": "S1",
        "points": 10
    })
}
