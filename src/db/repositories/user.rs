use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, SqlErr, TransactionTrait,
};
use tracing::warn;

use super::{audit, token};
use crate::config::{PasswordAlgorithm, SecurityConfig};
use crate::entities::{cabinet_actors, cabinets, users};
use audit::{AuthEventKind, NewAuthEvent};

pub const STATUS_ACTIVE: &str = "active";
pub const ROLE_USER: &str = "user";

const DEFAULT_CABINET_NAME: &str = "Cabinet principal";
const OWNER_ACTOR_KIND: &str = "titulaire";
const OWNER_ACTOR_FALLBACK_NAME: &str = "Titulaire";

/// Account data returned from the repository (without the password hash)
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i32,
    pub email: String,
    pub email_normalized: String,
    pub email_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub status: String,
    pub failed_login_count: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

impl From<users::Model> for Account {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            email_normalized: model.email_normalized,
            email_verified: model.email_verified,
            first_name: model.first_name,
            last_name: model.last_name,
            role: model.role,
            status: model.status,
            failed_login_count: model.failed_login_count,
            locked_until: model.locked_until,
            last_login_at: model.last_login_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Everything the registration transaction needs, precomputed by the
/// service layer (hashes are produced outside the transaction).
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub email: String,
    pub email_normalized: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub token_hash: String,
    pub token_expires_at: DateTime<Utc>,
    pub request_ip: Option<Vec<u8>>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RegisteredAccount {
    pub user_id: i32,
    pub cabinet_id: i32,
}

/// Registration either creates the full row set or touches nothing.
#[derive(Debug, Clone, Copy)]
pub enum RegistrationOutcome {
    Created(RegisteredAccount),
    /// The normalized email is already taken; the transaction rolled back.
    EmailTaken,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Look up an account by normalized email.
    pub async fn get_by_normalized_email(&self, email_normalized: &str) -> Result<Option<Account>> {
        let user = users::Entity::find()
            .filter(users::Column::EmailNormalized.eq(email_normalized))
            .one(&self.conn)
            .await
            .context("Failed to query user by normalized email")?;

        Ok(user.map(Account::from))
    }

    /// Look up an account plus its stored password hash (login path).
    pub async fn get_by_normalized_email_with_password(
        &self,
        email_normalized: &str,
    ) -> Result<Option<(Account, String)>> {
        let user = users::Entity::find()
            .filter(users::Column::EmailNormalized.eq(email_normalized))
            .one(&self.conn)
            .await
            .context("Failed to query user for credential check")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (Account::from(u), password_hash)
        }))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Account>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(Account::from))
    }

    /// Account plus stored hash by id (password-change path).
    pub async fn get_by_id_with_password(&self, id: i32) -> Result<Option<(Account, String)>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password change")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (Account::from(u), password_hash)
        }))
    }

    /// Persist the outcome of a failed password check: the new failure
    /// count and (when the threshold was crossed) the lock timestamp, in
    /// one statement keyed by id.
    pub async fn record_login_failure(
        &self,
        user_id: i32,
        failed_count: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        users::Entity::update_many()
            .col_expr(users::Column::FailedLoginCount, Expr::value(failed_count))
            .col_expr(users::Column::LockedUntil, Expr::value(locked_until))
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to record login failure")?;

        Ok(())
    }

    /// Reset failure bookkeeping and stamp the login, in one statement.
    pub async fn record_login_success(&self, user_id: i32) -> Result<()> {
        let now = Utc::now();

        users::Entity::update_many()
            .col_expr(users::Column::FailedLoginCount, Expr::value(0))
            .col_expr(
                users::Column::LockedUntil,
                Expr::value(None::<DateTime<Utc>>),
            )
            .col_expr(users::Column::LastLoginAt, Expr::value(Some(now)))
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to record login success")?;

        Ok(())
    }

    /// Replace the stored credential hash.
    pub async fn update_password_hash(&self, user_id: i32, password_hash: &str) -> Result<()> {
        let now = Utc::now();

        users::Entity::update_many()
            .col_expr(
                users::Column::PasswordHash,
                Expr::value(password_hash.to_string()),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to update password hash")?;

        Ok(())
    }

    /// Update the display names (empty submissions arrive as None).
    pub async fn update_profile_names(
        &self,
        user_id: i32,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<()> {
        let now = Utc::now();

        users::Entity::update_many()
            .col_expr(users::Column::FirstName, Expr::value(first_name))
            .col_expr(users::Column::LastName, Expr::value(last_name))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to update profile names")?;

        Ok(())
    }

    /// One transaction: user row, `register` audit event, verification
    /// token, default cabinet, and its titulaire actor. Any failure rolls
    /// the whole set back; a duplicate normalized email surfaces as
    /// [`RegistrationOutcome::EmailTaken`].
    pub async fn register(&self, reg: NewRegistration) -> Result<RegistrationOutcome> {
        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to open registration transaction")?;
        let now = Utc::now();

        let user = users::ActiveModel {
            email: Set(reg.email.clone()),
            email_normalized: Set(reg.email_normalized.clone()),
            email_verified: Set(false),
            password_hash: Set(reg.password_hash.clone()),
            first_name: Set(reg.first_name.clone()),
            last_name: Set(reg.last_name.clone()),
            role: Set(ROLE_USER.to_string()),
            status: Set(STATUS_ACTIVE.to_string()),
            failed_login_count: Set(0),
            locked_until: Set(None),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let user = match user.insert(&txn).await {
            Ok(user) => user,
            Err(err) => {
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    return Ok(RegistrationOutcome::EmailTaken);
                }
                return Err(err).context("Failed to insert user row");
            }
        };

        audit::append_on(
            &txn,
            NewAuthEvent {
                user_id: Some(user.id),
                kind: AuthEventKind::Register,
                email_normalized: Some(reg.email_normalized.clone()),
                success: true,
                details: None,
                request_ip: reg.request_ip.clone(),
                user_agent: reg.user_agent.clone(),
            },
        )
        .await
        .context("Failed to record register event")?;

        token::insert_on(
            &txn,
            token::NewToken {
                user_id: user.id,
                token_hash: reg.token_hash.clone(),
                expires_at: reg.token_expires_at,
                request_ip: reg.request_ip.clone(),
                user_agent: reg.user_agent.clone(),
            },
        )
        .await
        .context("Failed to insert verification token")?;

        let cabinet = cabinets::ActiveModel {
            owner_user_id: Set(user.id),
            name: Set(DEFAULT_CABINET_NAME.to_string()),
            is_active: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert default cabinet")?;

        cabinet_actors::ActiveModel {
            cabinet_id: Set(cabinet.id),
            kind: Set(OWNER_ACTOR_KIND.to_string()),
            display_name: Set(owner_display_name(
                reg.first_name.as_deref(),
                reg.last_name.as_deref(),
            )),
            first_name: Set(reg.first_name),
            last_name: Set(reg.last_name),
            email: Set(Some(reg.email)),
            is_active: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert titulaire actor")?;

        txn.commit()
            .await
            .context("Failed to commit registration")?;

        Ok(RegistrationOutcome::Created(RegisteredAccount {
            user_id: user.id,
            cabinet_id: cabinet.id,
        }))
    }
}

/// Flip the verified flag; runs on the token-consumption transaction.
pub(crate) async fn mark_email_verified_on<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<(), sea_orm::DbErr> {
    users::Entity::update_many()
        .col_expr(users::Column::EmailVerified, Expr::value(true))
        .filter(users::Column::Id.eq(user_id))
        .exec(conn)
        .await?;

    Ok(())
}

fn owner_display_name(first_name: Option<&str>, last_name: Option<&str>) -> String {
    let joined = [first_name, last_name]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let joined = joined.trim();

    if joined.is_empty() {
        OWNER_ACTOR_FALLBACK_NAME.to_string()
    } else {
        joined.to_string()
    }
}

/// Hash a password with the configured algorithm. Argon2 variants take
/// their cost parameters from the security config; bcrypt uses its
/// default cost.
pub fn hash_password(password: &str, security: &SecurityConfig) -> Result<String> {
    match security.password_algorithm {
        PasswordAlgorithm::Argon2id => argon2_hash(password, Algorithm::Argon2id, security),
        PasswordAlgorithm::Argon2i => argon2_hash(password, Algorithm::Argon2i, security),
        PasswordAlgorithm::Bcrypt => {
            bcrypt::hash(password, bcrypt::DEFAULT_COST).context("Failed to bcrypt password")
        }
    }
}

fn argon2_hash(password: &str, algorithm: Algorithm, security: &SecurityConfig) -> Result<String> {
    let params = Params::new(
        security.argon2_memory_cost_kib,
        security.argon2_time_cost,
        security.argon2_parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::new(algorithm, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Verify a password against whichever scheme produced the stored hash.
/// The hash formats are self-describing: bcrypt hashes start with `$2`,
/// everything else is parsed as a PHC string (argon2 family). An
/// unparseable stored hash counts as a mismatch rather than an error so
/// the login ladder still reaches its audit branch.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    if stored_hash.starts_with("$2") {
        return bcrypt::verify(password, stored_hash).unwrap_or(false);
    }

    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!(error = %err, "Stored password hash is unparseable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_security(algorithm: PasswordAlgorithm) -> SecurityConfig {
        SecurityConfig {
            password_algorithm: algorithm,
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        }
    }

    #[test]
    fn argon2id_roundtrip() {
        let security = fast_security(PasswordAlgorithm::Argon2id);
        let hash = hash_password("correct horse battery", &security).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("correct horse staple", &hash));
    }

    #[test]
    fn argon2i_roundtrip() {
        let security = fast_security(PasswordAlgorithm::Argon2i);
        let hash = hash_password("correct horse battery", &security).unwrap();

        assert!(hash.starts_with("$argon2i$"));
        assert!(verify_password("correct horse battery", &hash));
    }

    #[test]
    fn bcrypt_roundtrip() {
        let security = fast_security(PasswordAlgorithm::Bcrypt);
        let hash = hash_password("correct horse battery", &security).unwrap();

        assert!(hash.starts_with("$2"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("correct horse staple", &hash));
    }

    #[test]
    fn unparseable_hash_is_a_mismatch() {
        assert!(!verify_password("anything", "not-a-hash"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn owner_display_name_falls_back() {
        assert_eq!(owner_display_name(Some("Jean"), Some("Dupont")), "Jean Dupont");
        assert_eq!(owner_display_name(Some("Jean"), None), "Jean");
        assert_eq!(owner_display_name(None, None), "Titulaire");
    }
}
