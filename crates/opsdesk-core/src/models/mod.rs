//! Data models for the application
//!
//! This module contains all data structures used throughout the application,
//! organized by domain. Each sub-module represents a specific entity.

mod audit;
mod membership;
mod organization;
mod ticket;
mod user;

// Re-export all models for convenient imports
pub use audit::*;
pub use membership::*;
pub use organization::*;
pub use ticket::*;
pub use user::*;
