use crate::auth::models::AuthUser;
use crate::auth::token::verify_access_token;
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use opsdesk_core::AppError;
use opsdesk_db::UserRepository;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AuthFailureLimiter {
    inner: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_failures: u32,
    window: Duration,
}

impl AuthFailureLimiter {
    pub fn new(max_failures: u32, window_seconds: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_failures,
            window: Duration::from_secs(window_seconds),
        }
    }

    pub async fn record_failure(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        // Sweep entries whose window has lapsed so one-off failures from
        // many addresses cannot grow the map without bound.
        guard.retain(|_, entry| now < entry.1);
        let (count, reset_at) = guard.entry(ip.to_string()).or_insert((0, now + self.window));
        if now >= *reset_at {
            *count = 0;
            *reset_at = now + self.window;
        }
        *count += 1;
        *count >= self.max_failures
    }

    pub async fn is_blocked(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        if let Some((count, reset_at)) = guard.get(ip) {
            if Instant::now() >= *reset_at {
                guard.remove(ip);
                return false;
            }
            return *count >= self.max_failures;
        }
        false
    }

    #[cfg(test)]
    async fn tracked_ips(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: String,
    pub user_repository: UserRepository,
    pub auth_failure_limiter: Option<Arc<AuthFailureLimiter>>,
}

fn client_ip(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            request
                .extensions()
                .get::<std::net::SocketAddr>()
                .map(|addr| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn too_many_failures() -> Response {
    (StatusCode::TOO_MANY_REQUESTS, "Too many failed auth attempts").into_response()
}

async fn reject(
    auth_state: &AuthState,
    client_ip: &str,
    reason: &str,
) -> Response {
    if let Some(ref limiter) = auth_state.auth_failure_limiter {
        if limiter.record_failure(client_ip).await {
            return too_many_failures();
        }
    }
    tracing::info!(
        target: "audit",
        client_ip = %client_ip,
        success = false,
        reason = %reason,
        "Authentication attempt"
    );
    HttpAppError(AppError::Unauthorized(reason.to_string())).into_response()
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let client_ip = client_ip(&request);
    if let Some(ref limiter) = auth_state.auth_failure_limiter {
        if limiter.is_blocked(&client_ip).await {
            return too_many_failures();
        }
    }

    let auth_header = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => return reject(&auth_state, &client_ip, "Missing authorization header").await,
    };

    if !auth_header.starts_with("Bearer ") {
        return reject(&auth_state, &client_ip, "Invalid authorization header format").await;
    }

    let token = &auth_header[7..]; // Remove "Bearer " prefix
    let claims = match verify_access_token(&auth_state.jwt_secret, token) {
        Ok(claims) => claims,
        Err(_) => return reject(&auth_state, &client_ip, "Invalid or expired access token").await,
    };

    // The subject must still exist: a deleted account keeps a valid-looking
    // token until it expires.
    let user = match auth_state.user_repository.find_by_id(claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => return reject(&auth_state, &client_ip, "Unknown user").await,
        Err(e) => return HttpAppError(e).into_response(),
    };

    tracing::debug!(user_id = %user.id, "Request authenticated");

    request.extensions_mut().insert(AuthUser {
        user_id: user.id,
        email: user.email,
    });
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limiter_blocks_after_max_failures() {
        let limiter = AuthFailureLimiter::new(3, 60);
        assert!(!limiter.is_blocked("10.0.0.1").await);
        assert!(!limiter.record_failure("10.0.0.1").await);
        assert!(!limiter.record_failure("10.0.0.1").await);
        assert!(limiter.record_failure("10.0.0.1").await);
        assert!(limiter.is_blocked("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_limiter_drops_lapsed_entries_on_new_failures() {
        // A zero-second window lapses immediately, so each new failure
        // sweeps the previous address out of the map.
        let limiter = AuthFailureLimiter::new(5, 0);
        limiter.record_failure("10.0.0.1").await;
        assert_eq!(limiter.tracked_ips().await, 1);
        limiter.record_failure("10.0.0.2").await;
        assert_eq!(limiter.tracked_ips().await, 1);
        assert!(!limiter.is_blocked("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_limiter_tracks_ips_independently() {
        let limiter = AuthFailureLimiter::new(2, 60);
        limiter.record_failure("10.0.0.1").await;
        limiter.record_failure("10.0.0.1").await;
        assert!(limiter.is_blocked("10.0.0.1").await);
        assert!(!limiter.is_blocked("10.0.0.2").await);
    }
}
