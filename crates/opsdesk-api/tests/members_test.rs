//! Membership management and the last-owner invariant

mod helpers;

use axum::http::StatusCode;
use helpers::auth::{signup, signup_and_join};
use helpers::{api_path, setup_test_app};
use opsdesk_db::MembershipRepository;
use serde_json::{json, Value};

#[tokio::test]
async fn test_owner_adds_member_and_it_lists() {
    let app = setup_test_app().await;
    let owner = signup(&app, "m-owner@example.com", "Members Org").await;
    let agent = signup_and_join(&app, &owner, "m-agent@example.com", "agent").await;

    let response = app
        .server
        .get(&api_path(&format!(
            "/organizations/{}/members",
            owner.organization_id
        )))
        .authorization_bearer(&owner.access_token)
        .await;
    response.assert_status_ok();
    let members: Vec<Value> = response.json();
    assert_eq!(members.len(), 2);
    let agent_row = members
        .iter()
        .find(|m| m["user_id"] == agent.user_id.to_string())
        .expect("agent listed");
    assert_eq!(agent_row["role"], "agent");
    assert_eq!(agent_row["email"], "m-agent@example.com");
}

#[tokio::test]
async fn test_adding_roles_is_owner_only() {
    let app = setup_test_app().await;
    let owner = signup(&app, "a-owner@example.com", "Add Org").await;
    let admin = signup_and_join(&app, &owner, "a-admin@example.com", "admin").await;
    let stranger = signup(&app, "a-stranger@example.com", "Stranger Org").await;

    let response = app
        .server
        .post(&api_path(&format!(
            "/organizations/{}/members",
            owner.organization_id
        )))
        .authorization_bearer(&admin.access_token)
        .json(&json!({ "email": stranger.email, "role": "viewer" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_adding_unknown_email_is_not_found() {
    let app = setup_test_app().await;
    let owner = signup(&app, "u-owner@example.com", "Unknown Org").await;

    let response = app
        .server
        .post(&api_path(&format!(
            "/organizations/{}/members",
            owner.organization_id
        )))
        .authorization_bearer(&owner.access_token)
        .json(&json!({ "email": "ghost@example.com", "role": "agent" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_adding_same_member_twice_is_conflict() {
    let app = setup_test_app().await;
    let owner = signup(&app, "t-owner@example.com", "Twice Org").await;
    let agent = signup_and_join(&app, &owner, "t-agent@example.com", "agent").await;

    let response = app
        .server
        .post(&api_path(&format!(
            "/organizations/{}/members",
            owner.organization_id
        )))
        .authorization_bearer(&owner.access_token)
        .json(&json!({ "email": agent.email, "role": "viewer" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cannot_remove_the_last_owner() {
    let app = setup_test_app().await;
    let owner = signup(&app, "solo-owner@example.com", "Solo Org").await;

    // Owner self-removal goes through the same invariant.
    let response = app
        .server
        .delete(&api_path(&format!(
            "/organizations/{}/members/{}",
            owner.organization_id, owner.user_id
        )))
        .authorization_bearer(&owner.access_token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_cannot_demote_the_last_owner() {
    let app = setup_test_app().await;
    let owner = signup(&app, "demote-owner@example.com", "Demote Org").await;

    let response = app
        .server
        .patch(&api_path(&format!(
            "/organizations/{}/members/{}",
            owner.organization_id, owner.user_id
        )))
        .authorization_bearer(&owner.access_token)
        .json(&json!({ "role": "admin" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_second_owner_unlocks_demotion_and_removal() {
    let app = setup_test_app().await;
    let owner = signup(&app, "two-owner@example.com", "Two Owners Org").await;
    let second = signup_and_join(&app, &owner, "second-owner@example.com", "owner").await;

    // With two owners the original can be demoted.
    let response = app
        .server
        .patch(&api_path(&format!(
            "/organizations/{}/members/{}",
            owner.organization_id, owner.user_id
        )))
        .authorization_bearer(&second.access_token)
        .json(&json!({ "role": "admin" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["role"], "admin");

    // But now the second owner is the last one again.
    let response = app
        .server
        .delete(&api_path(&format!(
            "/organizations/{}/members/{}",
            owner.organization_id, second.user_id
        )))
        .authorization_bearer(&second.access_token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_owner_count_locks_the_owner_rows() {
    let app = setup_test_app().await;
    let owner = signup(&app, "lock-owner@example.com", "Lock Org").await;
    signup_and_join(&app, &owner, "lock-second@example.com", "owner").await;

    let repo = MembershipRepository::new(app.pool().clone());
    let mut tx1 = app.pool().begin().await.expect("begin tx1");
    let owners = repo
        .count_owners_tx(&mut tx1, owner.organization_id)
        .await
        .expect("count owners");
    assert_eq!(owners, 2);

    // While one transaction holds the check's locks, a second cannot take
    // them: two concurrent removals serialize instead of both counting two
    // owners and each deleting one.
    let mut tx2 = app.pool().begin().await.expect("begin tx2");
    let contended = sqlx::query(
        "SELECT id FROM memberships WHERE organization_id = $1 AND role = 'owner' FOR UPDATE NOWAIT",
    )
    .bind(owner.organization_id)
    .fetch_all(&mut *tx2)
    .await;
    assert!(contended.is_err(), "owner rows should be lock-contended");

    tx1.rollback().await.expect("rollback tx1");
    tx2.rollback().await.expect("rollback tx2");
}

#[tokio::test]
async fn test_admin_can_remove_a_member() {
    let app = setup_test_app().await;
    let owner = signup(&app, "rm-owner@example.com", "Remove Org").await;
    let admin = signup_and_join(&app, &owner, "rm-admin@example.com", "admin").await;
    let viewer = signup_and_join(&app, &owner, "rm-viewer@example.com", "viewer").await;

    let response = app
        .server
        .delete(&api_path(&format!(
            "/organizations/{}/members/{}",
            owner.organization_id, viewer.user_id
        )))
        .authorization_bearer(&admin.access_token)
        .await;
    response.assert_status_ok();

    // The removed member no longer has access.
    let response = app
        .server
        .get(&api_path(&format!(
            "/organizations/{}/members",
            owner.organization_id
        )))
        .authorization_bearer(&viewer.access_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_agent_cannot_remove_members() {
    let app = setup_test_app().await;
    let owner = signup(&app, "na-owner@example.com", "No Agent Org").await;
    let agent = signup_and_join(&app, &owner, "na-agent@example.com", "agent").await;
    let viewer = signup_and_join(&app, &owner, "na-viewer@example.com", "viewer").await;

    let response = app
        .server
        .delete(&api_path(&format!(
            "/organizations/{}/members/{}",
            owner.organization_id, viewer.user_id
        )))
        .authorization_bearer(&agent.access_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_audit_log_visibility_and_content() {
    let app = setup_test_app().await;
    let owner = signup(&app, "log-owner@example.com", "Log Org").await;
    let admin = signup_and_join(&app, &owner, "log-admin@example.com", "admin").await;
    let viewer = signup_and_join(&app, &owner, "log-viewer@example.com", "viewer").await;

    // org created + two members added = 3 entries.
    app.wait_for_audit_count(owner.organization_id, 3).await;

    let path = api_path(&format!(
        "/organizations/{}/audit-log",
        owner.organization_id
    ));

    let response = app
        .server
        .get(&path)
        .authorization_bearer(&viewer.access_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = app
        .server
        .get(&path)
        .authorization_bearer(&admin.access_token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["total"].as_i64().unwrap() >= 3);
    let actions: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert!(actions.contains(&"organization_created"));
    assert!(actions.contains(&"member_added"));
}
