//! Opsdesk Core Library
//!
//! This crate provides the domain models, authorization policy, ticket
//! lifecycle rules, error types, and configuration shared across all
//! opsdesk components.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod policy;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use lifecycle::{legal_targets, plan_transition, TransitionOutcome};
