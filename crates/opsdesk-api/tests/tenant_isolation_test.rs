//! Cross-organization isolation
//!
//! Every read and write is scoped by the caller's membership. A resource in
//! another organization is either a 403 (no membership in the path org) or a
//! 404 (membership, but the id belongs elsewhere) - never a leak.

mod helpers;

use axum::http::StatusCode;
use helpers::auth::signup;
use helpers::{api_path, setup_test_app};
use serde_json::{json, Value};

#[tokio::test]
async fn test_non_member_cannot_touch_another_organization() {
    let app = setup_test_app().await;
    let alpha = signup(&app, "alpha@example.com", "Alpha Org").await;
    let beta = signup(&app, "beta@example.com", "Beta Org").await;

    // Read the org itself.
    let response = app
        .server
        .get(&api_path(&format!("/organizations/{}", alpha.organization_id)))
        .authorization_bearer(&beta.access_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // List its tickets.
    let response = app
        .server
        .get(&api_path(&format!(
            "/organizations/{}/tickets",
            alpha.organization_id
        )))
        .authorization_bearer(&beta.access_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // Create a ticket in it.
    let response = app
        .server
        .post(&api_path(&format!(
            "/organizations/{}/tickets",
            alpha.organization_id
        )))
        .authorization_bearer(&beta.access_token)
        .json(&json!({ "title": "Intrusion" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_foreign_ticket_id_reads_as_absent() {
    let app = setup_test_app().await;
    let alpha = signup(&app, "alpha2@example.com", "Alpha Two Org").await;
    let beta = signup(&app, "beta2@example.com", "Beta Two Org").await;

    let response = app
        .server
        .post(&api_path(&format!(
            "/organizations/{}/tickets",
            alpha.organization_id
        )))
        .authorization_bearer(&alpha.access_token)
        .json(&json!({ "title": "Alpha secret" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let ticket: Value = response.json();
    let ticket_id = ticket["id"].as_str().unwrap();

    // Beta addresses the alpha ticket through their own organization: the id
    // exists in the database but must be indistinguishable from absent.
    let response = app
        .server
        .get(&api_path(&format!(
            "/organizations/{}/tickets/{}",
            beta.organization_id, ticket_id
        )))
        .authorization_bearer(&beta.access_token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = app
        .server
        .patch(&api_path(&format!(
            "/organizations/{}/tickets/{}",
            beta.organization_id, ticket_id
        )))
        .authorization_bearer(&beta.access_token)
        .json(&json!({ "title": "Hijacked" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = app
        .server
        .delete(&api_path(&format!(
            "/organizations/{}/tickets/{}",
            beta.organization_id, ticket_id
        )))
        .authorization_bearer(&beta.access_token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ticket_listings_stay_within_the_organization() {
    let app = setup_test_app().await;
    let alpha = signup(&app, "alpha3@example.com", "Alpha Three Org").await;
    let beta = signup(&app, "beta3@example.com", "Beta Three Org").await;

    for account in [&alpha, &beta] {
        app.server
            .post(&api_path(&format!(
                "/organizations/{}/tickets",
                account.organization_id
            )))
            .authorization_bearer(&account.access_token)
            .json(&json!({ "title": "Mine" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = app
        .server
        .get(&api_path(&format!(
            "/organizations/{}/tickets",
            alpha.organization_id
        )))
        .authorization_bearer(&alpha.access_token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total"], 1);
    assert_eq!(
        body["items"][0]["organization_id"],
        alpha.organization_id.to_string()
    );
}

#[tokio::test]
async fn test_audit_log_is_organization_scoped() {
    let app = setup_test_app().await;
    let alpha = signup(&app, "alpha4@example.com", "Alpha Four Org").await;
    let beta = signup(&app, "beta4@example.com", "Beta Four Org").await;

    app.wait_for_audit_count(alpha.organization_id, 1).await;
    app.wait_for_audit_count(beta.organization_id, 1).await;

    let response = app
        .server
        .get(&api_path(&format!(
            "/organizations/{}/audit-log",
            alpha.organization_id
        )))
        .authorization_bearer(&alpha.access_token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    for entry in body["items"].as_array().unwrap() {
        assert_eq!(
            entry["organization_id"],
            alpha.organization_id.to_string()
        );
    }
}
