//! Opsdesk database layer
//!
//! Repository implementations over sqlx/Postgres. Every lookup is scoped to
//! its organization where one applies; primary keys alone never cross the
//! tenant boundary.

pub mod db;

pub use db::{
    AuditLogRepository, MembershipRepository, OrganizationRepository, RefreshToken,
    RefreshTokenRepository, TicketRepository, UserRepository,
};
pub use db::transaction::TransactionGuard;
