//! Role gates and membership management on account routes

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, Session, TestContext};
use keystead_shared::email::EmailTemplate;
use keystead_shared::store::Store;
use serde_json::json;
use uuid::Uuid;

struct Team {
    ctx: TestContext,
    account_id: Uuid,
    owner: Session,
    admin: Session,
    member: Session,
    outsider: Session,
}

async fn team() -> Team {
    let ctx = TestContext::new();
    let owner = ctx.signup("owner@example.com", "Team").await;
    let admin = ctx.signup("admin@example.com", "Admin's own").await;
    let member = ctx.signup("member@example.com", "Member's own").await;
    let outsider = ctx.signup("outsider@example.com", "Outsider's own").await;

    let mut owner_session = owner.session;
    for (email, role) in [("admin@example.com", 1), ("member@example.com", 2)] {
        let response = ctx
            .call_as(
                &mut owner_session,
                Method::POST,
                &format!("/api/v1/accounts/{}/users", owner.account_id),
                Some(json!({ "email": email, "role": role })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["pending"], false);
    }

    Team {
        ctx,
        account_id: owner.account_id,
        owner: owner_session,
        admin: admin.session,
        member: member.session,
        outsider: outsider.session,
    }
}

async fn status(
    ctx: &TestContext,
    session: &mut Session,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> StatusCode {
    ctx.call_as(session, method, uri, body).await.status()
}

#[tokio::test]
async fn test_member_gate() {
    let mut t = team().await;
    let uri = format!("/api/v1/accounts/{}", t.account_id);

    assert_eq!(status(&t.ctx, &mut t.owner, Method::GET, &uri, None).await, StatusCode::OK);
    assert_eq!(status(&t.ctx, &mut t.admin, Method::GET, &uri, None).await, StatusCode::OK);
    assert_eq!(status(&t.ctx, &mut t.member, Method::GET, &uri, None).await, StatusCode::OK);
    assert_eq!(
        status(&t.ctx, &mut t.outsider, Method::GET, &uri, None).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_admin_gate() {
    let mut t = team().await;
    let uri = format!("/api/v1/accounts/{}/full", t.account_id);

    assert_eq!(status(&t.ctx, &mut t.owner, Method::GET, &uri, None).await, StatusCode::OK);
    assert_eq!(status(&t.ctx, &mut t.admin, Method::GET, &uri, None).await, StatusCode::OK);
    assert_eq!(
        status(&t.ctx, &mut t.member, Method::GET, &uri, None).await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        status(&t.ctx, &mut t.outsider, Method::GET, &uri, None).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_owner_gate() {
    let mut t = team().await;
    let account_uri = format!("/api/v1/accounts/{}", t.account_id);
    let users_uri = format!("/api/v1/accounts/{}/users", t.account_id);
    let update = json!({ "title": "Renamed" });

    for session in [&mut t.admin, &mut t.member] {
        assert_eq!(
            status(&t.ctx, session, Method::PUT, &account_uri, Some(update.clone())).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(&t.ctx, session, Method::GET, &users_uri, None).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(
                &t.ctx,
                session,
                Method::POST,
                &users_uri,
                Some(json!({ "email": "x@example.com", "role": 2 }))
            )
            .await,
            StatusCode::FORBIDDEN
        );
    }

    let response = t
        .ctx
        .call_as(&mut t.owner, Method::PUT, &account_uri, Some(update))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let account = body_json(response).await;
    assert_eq!(account["data"]["title"], "Renamed");
    assert!(account["data"].get("description").is_none());

    let response = t
        .ctx
        .call_as(&mut t.member, Method::GET, &account_uri, None)
        .await;
    assert_eq!(body_json(response).await["data"]["title"], "Renamed");
}

#[tokio::test]
async fn test_list_users_shows_members_and_invitations() {
    let mut t = team().await;
    let users_uri = format!("/api/v1/accounts/{}/users", t.account_id);

    let response = t
        .ctx
        .call_as(
            &mut t.owner,
            Method::POST,
            &users_uri,
            Some(json!({ "email": "later@example.com", "role": 2 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = t.ctx.call_as(&mut t.owner, Method::GET, &users_uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 3);
    let owner = users
        .iter()
        .find(|u| u["email"] == "owner@example.com")
        .unwrap();
    assert_eq!(owner["role"], 0);

    let pending = body["pendingInvitations"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["email"], "later@example.com");
    assert_eq!(pending[0]["role"], 2);
}

#[tokio::test]
async fn test_add_user_rules() {
    let mut t = team().await;
    let users_uri = format!("/api/v1/accounts/{}/users", t.account_id);

    for role in [0, 3, -1] {
        assert_eq!(
            status(
                &t.ctx,
                &mut t.owner,
                Method::POST,
                &users_uri,
                Some(json!({ "email": "new@example.com", "role": role }))
            )
            .await,
            StatusCode::BAD_REQUEST,
            "role {}",
            role
        );
    }

    // already a member
    assert_eq!(
        status(
            &t.ctx,
            &mut t.owner,
            Method::POST,
            &users_uri,
            Some(json!({ "email": "member@example.com", "role": 1 }))
        )
        .await,
        StatusCode::CONFLICT
    );

    // already invited
    let invite = json!({ "email": "pending@example.com", "role": 2 });
    assert_eq!(
        status(&t.ctx, &mut t.owner, Method::POST, &users_uri, Some(invite.clone())).await,
        StatusCode::CREATED
    );
    assert_eq!(
        status(&t.ctx, &mut t.owner, Method::POST, &users_uri, Some(invite)).await,
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn test_add_user_emails() {
    let mut t = team().await;
    let users_uri = format!("/api/v1/accounts/{}/users", t.account_id);

    let added = t.ctx.outbox.last_to("member@example.com").await.unwrap();
    assert_eq!(added.template, EmailTemplate::AddedToAccount);
    assert_eq!(added.substitutions["account_title"], "Team");
    assert_eq!(added.substitutions["inviter_name"], "Test User");

    t.ctx
        .call_as(
            &mut t.owner,
            Method::POST,
            &users_uri,
            Some(json!({ "email": "fresh@example.com", "role": 1 })),
        )
        .await;
    let invited = t.ctx.outbox.last_to("fresh@example.com").await.unwrap();
    assert_eq!(invited.template, EmailTemplate::AccountInvitation);
    assert_eq!(invited.substitutions["account_title"], "Team");
}

#[tokio::test]
async fn test_remove_user() {
    let mut t = team().await;
    let account_uri = format!("/api/v1/accounts/{}", t.account_id);
    let owner_id = t.owner.user_id;
    let member_id = t.member.user_id;

    assert_eq!(
        status(
            &t.ctx,
            &mut t.owner,
            Method::DELETE,
            &format!("{}/users/{}", account_uri, owner_id),
            None
        )
        .await,
        StatusCode::FORBIDDEN
    );

    let response = t
        .ctx
        .call_as(
            &mut t.owner,
            Method::DELETE,
            &format!("{}/users/{}", account_uri, member_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(t
        .ctx
        .store
        .find_role(member_id, t.account_id)
        .await
        .unwrap()
        .is_none());

    assert_eq!(
        status(&t.ctx, &mut t.member, Method::GET, &account_uri, None).await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        status(
            &t.ctx,
            &mut t.owner,
            Method::DELETE,
            &format!("{}/users/{}", account_uri, member_id),
            None
        )
        .await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_gate_for_unknown_account_is_forbidden() {
    let mut t = team().await;

    assert_eq!(
        status(
            &t.ctx,
            &mut t.owner,
            Method::GET,
            &format!("/api/v1/accounts/{}", Uuid::new_v4()),
            None
        )
        .await,
        StatusCode::FORBIDDEN
    );
}
