//! Account and membership fixtures for integration tests

use super::{api_path, TestApp};
use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "a-strong-password";

/// An account created through the signup endpoint, with its tokens.
pub struct TestAccount {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Sign up a fresh account; the account owns a new organization.
pub async fn signup(app: &TestApp, email: &str, organization_name: &str) -> TestAccount {
    let response = app
        .server
        .post(&api_path("/auth/signup"))
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD,
            "name": "Test User",
            "organization_name": organization_name,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();

    TestAccount {
        user_id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
        organization_id: body["organization"]["id"].as_str().unwrap().parse().unwrap(),
        email: email.to_string(),
        access_token: body["tokens"]["access_token"].as_str().unwrap().to_string(),
        refresh_token: body["tokens"]["refresh_token"].as_str().unwrap().to_string(),
    }
}

/// Sign up a second account and add it to `owner`'s organization with `role`.
/// The returned account's `organization_id` is the owner's organization.
pub async fn signup_and_join(
    app: &TestApp,
    owner: &TestAccount,
    email: &str,
    role: &str,
) -> TestAccount {
    let mut member = signup(app, email, &format!("{}-own-org", email)).await;

    let response = app
        .server
        .post(&api_path(&format!(
            "/organizations/{}/members",
            owner.organization_id
        )))
        .authorization_bearer(&owner.access_token)
        .json(&json!({ "email": email, "role": role }))
        .await;
    response.assert_status(StatusCode::CREATED);

    member.organization_id = owner.organization_id;
    member
}
