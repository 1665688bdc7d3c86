//! API-wide constants

/// Base path prefix for all API routes
pub const API_PREFIX: &str = "/api/v1";
