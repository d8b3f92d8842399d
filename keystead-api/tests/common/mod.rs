//! Shared harness for the API integration tests
//!
//! Every context gets its own router over a fresh [`MemoryStore`] and
//! [`MemoryOutbox`], so tests never share state. Requests go straight into the
//! router through `tower::Service::call`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use keystead_api::app::{build_router, AppState};
use keystead_api::config::Config;
use keystead_shared::auth::jwt::TokenIssuer;
use keystead_shared::crypto::AesGcmCrypto;
use keystead_shared::email::MemoryOutbox;
use keystead_shared::services::Services;
use keystead_shared::store::{MemoryStore, Store};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::Service as _;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-jwt-secret-32-bytes!";
pub const DATA_KEY: &str = "integration-test-data-key-32-bytes!!";
pub const PASSWORD: &str = "Corr3ct-Horse-Battery";

pub const NEW_TOKEN: &str = "x-new-token";
pub const SIGNUP_TOKEN: &str = "x-signup-token";

pub struct TestContext {
    pub app: axum::Router,
    pub store: MemoryStore,
    pub outbox: MemoryOutbox,
    pub tokens: TokenIssuer,
}

/// A signed-in user whose token is kept current across requests
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

/// Result of a completed signup
#[derive(Debug, Clone)]
pub struct SignedUp {
    pub account_id: Uuid,
    pub session: Session,
}

impl TestContext {
    pub fn new() -> Self {
        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            "DATA_ENCRYPTION_KEY" => Some(DATA_KEY.to_string()),
            _ => None,
        })
        .expect("test configuration");

        let store = MemoryStore::new();
        let outbox = MemoryOutbox::new();
        let tokens = TokenIssuer::new(JWT_SECRET);

        let services = Services::new(
            Arc::new(store.clone()),
            Arc::new(AesGcmCrypto::from_secret(DATA_KEY)),
            Arc::new(outbox.clone()),
            tokens.clone(),
        );
        let app = build_router(AppState::new(services, config));

        Self {
            app,
            store,
            outbox,
            tokens,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().call(request).await.unwrap()
    }

    /// Builds and sends a request with optional bearer token, extra headers and JSON body
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.request(Method::POST, uri, None, &[], Some(body)).await
    }

    /// Sends an authenticated request and adopts the rotated token
    pub async fn call_as(
        &self,
        session: &mut Session,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response<Body> {
        let token = session.token.clone();
        let response = self.request(method, uri, Some(&token), &[], body).await;

        if let Some(token) = header(&response, NEW_TOKEN) {
            session.token = token;
        }

        response
    }

    /// Runs the signup email and code steps and returns the signup token
    pub async fn signup_token(&self, email: &str) -> String {
        let response = self
            .post_json("/api/v1/auth/signup/email", json!({ "email": email }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let code = self.outbox.last_code_for(email).await.expect("signup code sent");
        let response = self
            .post_json(
                "/api/v1/auth/signup/verify",
                json!({ "email": email, "code": code }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        header(&response, SIGNUP_TOKEN).expect("signup token header")
    }

    /// Sends the final signup step with the given token
    pub async fn complete_signup(&self, signup_token: &str, title: &str) -> Response<Body> {
        self.request(
            Method::POST,
            "/api/v1/auth/signup/account",
            None,
            &[(SIGNUP_TOKEN, signup_token)],
            Some(json!({
                "accountTitle": title,
                "accountDescription": "Created by an integration test",
                "userPassword": PASSWORD,
                "userFirstName": "Test",
                "userLastName": "User",
            })),
        )
        .await
    }

    /// Full signup over HTTP
    pub async fn signup(&self, email: &str, title: &str) -> SignedUp {
        let signup_token = self.signup_token(email).await;
        let response = self.complete_signup(&signup_token, title).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let token = header(&response, NEW_TOKEN).expect("session token header");
        let body = body_json(response).await;

        SignedUp {
            account_id: body["accountId"].as_str().unwrap().parse().unwrap(),
            session: Session {
                user_id: body["userId"].as_str().unwrap().parse().unwrap(),
                email: email.to_string(),
                token,
            },
        }
    }

    /// Password login followed by code verification
    pub async fn login(&self, email: &str, password: &str) -> Response<Body> {
        let response = self
            .post_json(
                "/api/v1/auth/login",
                json!({ "email": email, "password": password }),
            )
            .await;
        if response.status() != StatusCode::OK {
            return response;
        }

        let code = self.outbox.last_code_for(email).await.expect("login code sent");
        self.post_json("/api/v1/auth/verify", json!({ "email": email, "code": code }))
            .await
    }

    /// Session token currently stored for a user
    pub async fn stored_token(&self, user_id: Uuid) -> Option<String> {
        self.store
            .find_user_by_id(user_id)
            .await
            .unwrap()
            .and_then(|user| user.session_token)
    }
}

pub fn header(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}
