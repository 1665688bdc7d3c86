//! Authentication handlers
//!
//! Signup creates the user, their organization, and the Owner membership in
//! one transaction. Login and refresh issue a new token pair; a presented
//! refresh token is always rotated.

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::{
    generate_refresh_token, hash_refresh_token, issue_access_token, TokenPair,
};
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use opsdesk_core::models::{AuditAction, Organization, Role, UserResponse};
use opsdesk_core::AppError;
use opsdesk_db::TransactionGuard;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub organization_name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
    pub tokens: TokenPair,
}

/// Opportunistically purge expired refresh-token rows in the background.
/// Expired tokens are already unusable (`find_valid` filters on expiry);
/// this keeps the table from growing without bound.
fn sweep_expired_refresh_tokens(state: &AppState) {
    let repository = state.db.refresh_tokens.clone();
    tokio::spawn(async move {
        match repository.delete_expired().await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "Expired refresh tokens removed"),
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired refresh tokens"),
        }
    });
}

/// Issue an access/refresh pair for a user and persist the refresh digest.
async fn issue_token_pair(state: &AppState, user_id: Uuid) -> Result<TokenPair, AppError> {
    let access_token = issue_access_token(
        &state.config.jwt_secret,
        user_id,
        state.config.access_token_ttl_minutes,
    )?;
    let refresh_token = generate_refresh_token();
    let expires_at = Utc::now() + Duration::days(state.config.refresh_token_ttl_days);
    state
        .db
        .refresh_tokens
        .insert(user_id, &hash_refresh_token(&refresh_token), expires_at)
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.access_token_ttl_minutes * 60,
    })
}

/// Register a new account along with its organization. The user, the
/// organization, and the Owner membership are created atomically.
#[tracing::instrument(skip(state, request), fields(email = %request.email))]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<SignupRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate().map_err(AppError::from)?;

    let password_hash = hash_password(&request.password)?;

    let mut tx = TransactionGuard::begin(&state.db.pool).await?;
    let user = state
        .db
        .users
        .create_tx(&mut tx, &request.email, &password_hash, &request.name)
        .await?;
    let organization = state
        .db
        .organizations
        .create_tx(&mut tx, &request.organization_name)
        .await?;
    state
        .db
        .memberships
        .create_tx(&mut tx, user.id, organization.id, Role::Owner)
        .await?;
    tx.commit().await?;

    state.audit.record(
        organization.id,
        user.id,
        AuditAction::OrganizationCreated,
        None,
        serde_json::json!({ "organization_name": organization.name }),
    );

    let tokens = issue_token_pair(&state, user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserResponse::from(user),
            organization: Some(organization),
            tokens,
        }),
    ))
}

/// Exchange credentials for a token pair.
#[tracing::instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate().map_err(AppError::from)?;

    // Same error for an unknown email and a wrong password.
    let user = state
        .db
        .users
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    if !verify_password(&request.password, &user.password_hash)? {
        return Err(HttpAppError(AppError::Unauthorized(
            "Invalid email or password".to_string(),
        )));
    }

    sweep_expired_refresh_tokens(&state);
    let tokens = issue_token_pair(&state, user.id).await?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(user),
        organization: None,
        tokens,
    }))
}

/// Exchange a refresh token for a new token pair. The presented token is
/// revoked as part of the exchange; replaying it yields a 401.
#[tracing::instrument(skip(state, request))]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let token_hash = hash_refresh_token(&request.refresh_token);

    let stored = state
        .db
        .refresh_tokens
        .find_valid(&token_hash)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

    state.db.refresh_tokens.delete_by_hash(&token_hash).await?;

    sweep_expired_refresh_tokens(&state);
    let tokens = issue_token_pair(&state, stored.user_id).await?;

    Ok(Json(tokens))
}

/// Revoke a refresh token. Idempotent: revoking an unknown token succeeds.
#[tracing::instrument(skip(state, request))]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let token_hash = hash_refresh_token(&request.refresh_token);
    state.db.refresh_tokens.delete_by_hash(&token_hash).await?;

    Ok(Json(serde_json::json!({ "message": "Logged out" })))
}
