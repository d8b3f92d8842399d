//! Signup and login flows over HTTP

mod common;

use axum::http::{Method, StatusCode};
use common::{body_bytes, body_json, header, TestContext, NEW_TOKEN, PASSWORD, SIGNUP_TOKEN};
use keystead_shared::models::UserState;
use keystead_shared::store::Store;
use serde_json::json;

#[tokio::test]
async fn test_signup_end_to_end() {
    let ctx = TestContext::new();

    let response = ctx
        .post_json("/api/v1/auth/signup/email", json!({ "email": "ada@example.com" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let code = ctx.outbox.last_code_for("ada@example.com").await.unwrap();
    assert!((100_000..=999_999).contains(&code));

    let response = ctx
        .post_json(
            "/api/v1/auth/signup/verify",
            json!({ "email": "ada@example.com", "code": code }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let signup_token = header(&response, SIGNUP_TOKEN).unwrap();
    assert!(header(&response, NEW_TOKEN).is_none());
    assert!(body_bytes(response).await.is_empty());

    let response = ctx.complete_signup(&signup_token, "Ada's Workshop").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let session_token = header(&response, NEW_TOKEN).unwrap();
    let body = body_json(response).await;

    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["firstName"], "Test");
    assert_eq!(body["lastName"], "User");
    assert!(body.get("token").is_none());
    let account_id = body["accountId"].as_str().unwrap().to_string();

    let user = ctx
        .store
        .find_user_by_email("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.state, UserState::Active);
    assert_eq!(user.session_token.as_deref(), Some(session_token.as_str()));
    assert!(user.code.is_none());

    let response = ctx
        .request(
            Method::GET,
            &format!("/api/v1/accounts/{}", account_id),
            Some(&session_token),
            &[],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let account = body_json(response).await;
    assert_eq!(account["data"]["title"], "Ada's Workshop");
    assert_eq!(account["data"]["description"], "Created by an integration test");
}

#[tokio::test]
async fn test_signup_rejects_active_email() {
    let ctx = TestContext::new();
    ctx.signup("taken@example.com", "First").await;

    let response = ctx
        .post_json("/api/v1/auth/signup/email", json!({ "email": "taken@example.com" }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_signup_email_restart_issues_new_code() {
    let ctx = TestContext::new();

    for _ in 0..2 {
        let response = ctx
            .post_json("/api/v1/auth/signup/email", json!({ "email": "again@example.com" }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(ctx.outbox.sent().await.len(), 2);
    let user = ctx
        .store
        .find_user_by_email("again@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.code, ctx.outbox.last_code_for("again@example.com").await);
}

#[tokio::test]
async fn test_signup_code_is_single_use() {
    let ctx = TestContext::new();
    ctx.post_json("/api/v1/auth/signup/email", json!({ "email": "once@example.com" }))
        .await;
    let code = ctx.outbox.last_code_for("once@example.com").await.unwrap();
    let body = json!({ "email": "once@example.com", "code": code });

    let first = ctx.post_json("/api/v1/auth/signup/verify", body.clone()).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = ctx.post_json("/api/v1/auth/signup/verify", body).await;
    assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
    assert!(header(&second, SIGNUP_TOKEN).is_none());
}

#[tokio::test]
async fn test_signup_wrong_code_and_unknown_email() {
    let ctx = TestContext::new();
    ctx.post_json("/api/v1/auth/signup/email", json!({ "email": "wrong@example.com" }))
        .await;
    let code = ctx.outbox.last_code_for("wrong@example.com").await.unwrap();
    let wrong = if code == 999_999 { 100_000 } else { code + 1 };

    let response = ctx
        .post_json(
            "/api/v1/auth/signup/verify",
            json!({ "email": "wrong@example.com", "code": wrong }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx
        .post_json(
            "/api/v1/auth/signup/verify",
            json!({ "email": "nobody@example.com", "code": code }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // the right code still works after a miss
    let response = ctx
        .post_json(
            "/api/v1/auth/signup/verify",
            json!({ "email": "wrong@example.com", "code": code }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_complete_account_requires_signup_token() {
    let ctx = TestContext::new();

    let response = ctx
        .request(
            Method::POST,
            "/api/v1/auth/signup/account",
            None,
            &[],
            Some(json!({
                "accountTitle": "No token",
                "userPassword": PASSWORD,
                "userFirstName": "No",
                "userLastName": "Token",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx.complete_signup("not-a-token", "Bad token").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_token_is_not_a_signup_token() {
    let ctx = TestContext::new();
    let signed_up = ctx.signup("mixed@example.com", "Mixed").await;

    let response = ctx
        .complete_signup(&signed_up.session.token, "Second account")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.store.account_count().await, 1);
}

#[tokio::test]
async fn test_complete_account_rejects_weak_password() {
    let ctx = TestContext::new();
    let signup_token = ctx.signup_token("weak@example.com").await;

    let response = ctx
        .request(
            Method::POST,
            "/api/v1/auth/signup/account",
            None,
            &[(SIGNUP_TOKEN, signup_token.as_str())],
            Some(json!({
                "accountTitle": "Weak",
                "userPassword": "password",
                "userFirstName": "Weak",
                "userLastName": "Password",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.store.account_count().await, 0);
}

#[tokio::test]
async fn test_complete_account_is_all_or_nothing() {
    let ctx = TestContext::new();
    let signup_token = ctx.signup_token("atomic@example.com").await;

    ctx.store.fail_role_inserts(true);
    let response = ctx.complete_signup(&signup_token, "Doomed").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(header(&response, NEW_TOKEN).is_none());
    let body = body_json(response).await;
    assert_eq!(body["error"], "internal_error");
    assert_eq!(body["message"], "An internal error occurred");

    assert_eq!(ctx.store.account_count().await, 0);
    let user = ctx
        .store
        .find_user_by_email("atomic@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.state, UserState::Provisional);
    assert!(user.password_hash.is_empty());

    ctx.store.fail_role_inserts(false);
    let response = ctx.complete_signup(&signup_token, "Second try").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(ctx.store.account_count().await, 1);
}

#[tokio::test]
async fn test_invitation_becomes_role_at_signup() {
    let ctx = TestContext::new();
    let mut owner = ctx.signup("owner@example.com", "Team").await;

    let response = ctx
        .call_as(
            &mut owner.session,
            Method::POST,
            &format!("/api/v1/accounts/{}/users", owner.account_id),
            Some(json!({ "email": "invitee@example.com", "role": 1 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["pending"], true);
    assert_eq!(ctx.store.agent_users_for_email("invitee@example.com").await.len(), 1);

    let mut invitee = ctx.signup("invitee@example.com", "Invitee's own").await;

    assert!(ctx
        .store
        .agent_users_for_email("invitee@example.com")
        .await
        .is_empty());
    let role = ctx
        .store
        .find_role(invitee.session.user_id, owner.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(role.tier, 1);

    // the converted admin role passes the admin gate on the inviting account
    let response = ctx
        .call_as(
            &mut invitee.session,
            Method::GET,
            &format!("/api/v1/accounts/{}/full", owner.account_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let detailed = body_json(response).await;
    assert_eq!(detailed["data"]["title"], "Team");
    assert_eq!(detailed["users"].as_array().unwrap().len(), 2);
    assert!(detailed["pendingInvitations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_and_verify() {
    let ctx = TestContext::new();
    let signed_up = ctx.signup("login@example.com", "Login").await;

    let response = ctx
        .post_json(
            "/api/v1/auth/login",
            json!({ "email": "login@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());

    let code = ctx.outbox.last_code_for("login@example.com").await.unwrap();
    let response = ctx
        .post_json(
            "/api/v1/auth/verify",
            json!({ "email": "login@example.com", "code": code }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = header(&response, NEW_TOKEN).unwrap();
    let profile = body_json(response).await;
    assert_eq!(profile["email"], "login@example.com");

    // the session from signup was replaced
    assert_ne!(token, signed_up.session.token);
    assert_eq!(
        ctx.stored_token(signed_up.session.user_id).await.as_deref(),
        Some(token.as_str())
    );

    let replay = ctx
        .post_json(
            "/api/v1/auth/verify",
            json!({ "email": "login@example.com", "code": code }),
        )
        .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials_uniformly() {
    let ctx = TestContext::new();
    ctx.signup("real@example.com", "Real").await;
    ctx.post_json("/api/v1/auth/signup/email", json!({ "email": "pending@example.com" }))
        .await;
    let sent_before = ctx.outbox.sent().await.len();

    let attempts = [
        ("real@example.com", "Wr0ng-Password"),
        ("ghost@example.com", PASSWORD),
        ("pending@example.com", PASSWORD),
    ];

    for (email, password) in attempts {
        let response = ctx
            .post_json(
                "/api/v1/auth/login",
                json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", email);
        assert_eq!(body_json(response).await["message"], "Invalid credentials");
    }

    assert_eq!(ctx.outbox.sent().await.len(), sent_before);
}

#[tokio::test]
async fn test_invalid_email_is_a_validation_error() {
    let ctx = TestContext::new();

    let response = ctx
        .post_json("/api/v1/auth/signup/email", json!({ "email": "not-an-email" }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "email");
}
