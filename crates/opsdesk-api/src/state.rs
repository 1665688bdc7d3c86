use crate::audit::AuditSink;
use opsdesk_core::Config;
use opsdesk_db::{
    AuditLogRepository, MembershipRepository, OrganizationRepository, RefreshTokenRepository,
    TicketRepository, UserRepository,
};
use sqlx::PgPool;

/// Database-backed state: the connection pool plus one repository per table.
#[derive(Clone)]
pub struct DbState {
    pub pool: PgPool,
    pub users: UserRepository,
    pub organizations: OrganizationRepository,
    pub memberships: MembershipRepository,
    pub tickets: TicketRepository,
    pub refresh_tokens: RefreshTokenRepository,
    pub audit_log: AuditLogRepository,
}

impl DbState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            organizations: OrganizationRepository::new(pool.clone()),
            memberships: MembershipRepository::new(pool.clone()),
            tickets: TicketRepository::new(pool.clone()),
            refresh_tokens: RefreshTokenRepository::new(pool.clone()),
            audit_log: AuditLogRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Shared application state handed to every handler.
pub struct AppState {
    pub db: DbState,
    pub audit: AuditSink,
    pub config: Config,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let db = DbState::new(pool);
        let audit = AuditSink::new(db.audit_log.clone());
        Self { db, audit, config }
    }
}
