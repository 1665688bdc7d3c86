//! Database repositories for the data access layer
//!
//! One repository per entity, each holding a `PgPool` and providing the CRUD
//! and specialized queries that entity needs. Multi-step orchestrations use
//! the `*_tx` variants together with [`transaction::TransactionGuard`].

pub mod audit;
pub mod membership;
pub mod organization;
pub mod refresh_token;
pub mod ticket;
pub mod transaction;
pub mod user;

pub use audit::AuditLogRepository;
pub use membership::MembershipRepository;
pub use organization::OrganizationRepository;
pub use refresh_token::{RefreshToken, RefreshTokenRepository};
pub use ticket::TicketRepository;
pub use user::UserRepository;
