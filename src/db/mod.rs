use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::auth_events::Model as AuthEvent;
pub use repositories::audit::{AuthEventKind, NewAuthEvent, RequestContext};
pub use repositories::session::SessionRecord;
pub use repositories::token::{NewToken, VerifiedAccount};
pub use repositories::user::{
    Account, NewRegistration, RegisteredAccount, RegistrationOutcome,
};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn token_repo(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    fn session_repo(&self) -> repositories::session::SessionRepository {
        repositories::session::SessionRepository::new(self.conn.clone())
    }

    // ---- credential store ----

    pub async fn get_account_by_email(&self, email_normalized: &str) -> Result<Option<Account>> {
        self.user_repo()
            .get_by_normalized_email(email_normalized)
            .await
    }

    pub async fn get_account_by_email_with_password(
        &self,
        email_normalized: &str,
    ) -> Result<Option<(Account, String)>> {
        self.user_repo()
            .get_by_normalized_email_with_password(email_normalized)
            .await
    }

    pub async fn get_account_by_id(&self, id: i32) -> Result<Option<Account>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_account_by_id_with_password(
        &self,
        id: i32,
    ) -> Result<Option<(Account, String)>> {
        self.user_repo().get_by_id_with_password(id).await
    }

    pub async fn record_login_failure(
        &self,
        user_id: i32,
        failed_count: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.user_repo()
            .record_login_failure(user_id, failed_count, locked_until)
            .await
    }

    pub async fn record_login_success(&self, user_id: i32) -> Result<()> {
        self.user_repo().record_login_success(user_id).await
    }

    pub async fn update_password_hash(&self, user_id: i32, password_hash: &str) -> Result<()> {
        self.user_repo()
            .update_password_hash(user_id, password_hash)
            .await
    }

    pub async fn update_profile_names(
        &self,
        user_id: i32,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<()> {
        self.user_repo()
            .update_profile_names(user_id, first_name, last_name)
            .await
    }

    pub async fn register_account(&self, reg: NewRegistration) -> Result<RegistrationOutcome> {
        self.user_repo().register(reg).await
    }

    // ---- token issuer ----

    pub async fn issue_verification_token(&self, token: NewToken) -> Result<()> {
        self.token_repo().issue(token).await
    }

    pub async fn consume_verification_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<VerifiedAccount>> {
        self.token_repo().consume(token_hash).await
    }

    // ---- audit log ----

    pub async fn record_auth_event(&self, event: NewAuthEvent) -> Result<()> {
        self.audit_repo().append(event).await
    }

    pub async fn recent_auth_events(&self, limit: u64) -> Result<Vec<AuthEvent>> {
        self.audit_repo().recent(limit).await
    }

    // ---- sessions ----

    pub async fn create_session(
        &self,
        user_id: i32,
        email: &str,
        role: &str,
        ttl_minutes: i64,
    ) -> Result<SessionRecord> {
        self.session_repo()
            .create(user_id, email, role, ttl_minutes)
            .await
    }

    pub async fn delete_session(&self, key: &str) -> Result<()> {
        self.session_repo().delete(key).await
    }

    pub async fn find_live_session(
        &self,
        key: &str,
        ttl_minutes: i64,
    ) -> Result<Option<SessionRecord>> {
        self.session_repo().find_live(key, ttl_minutes).await
    }

    pub async fn set_session_active_cabinet(
        &self,
        key: &str,
        cabinet_id: Option<i32>,
    ) -> Result<()> {
        self.session_repo().set_active_cabinet(key, cabinet_id).await
    }
}
