use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect,
    Set,
};
use std::net::IpAddr;

use crate::entities::auth_events;

/// Event types of the audit trail. The string forms are the durable
/// contract; renaming a variant must not change its `as_str` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    LoginFailed,
    LoginSuccess,
    AccountLocked,
    Logout,
    Register,
    EmailVerified,
    RegisterVerifySent,
    PasswordResetSuccess,
}

impl AuthEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoginFailed => "login_failed",
            Self::LoginSuccess => "login_success",
            Self::AccountLocked => "account_locked",
            Self::Logout => "logout",
            Self::Register => "register",
            Self::EmailVerified => "email_verified",
            Self::RegisterVerifySent => "register_verify_sent",
            Self::PasswordResetSuccess => "password_reset_success",
        }
    }
}

/// Client-side metadata of the request driving an auth operation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub const fn new(ip: Option<IpAddr>, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }

    /// A context with no client metadata (CLI, tests, internal callers).
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            ip: None,
            user_agent: None,
        }
    }

    /// Binary form for storage: 4 octets for IPv4, 16 for IPv6.
    #[must_use]
    pub fn ip_bytes(&self) -> Option<Vec<u8>> {
        self.ip.map(|ip| match ip {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        })
    }

    /// User agent capped at 255 chars, matching the column width.
    #[must_use]
    pub fn user_agent_trimmed(&self) -> Option<String> {
        self.user_agent
            .as_deref()
            .map(|ua| ua.chars().take(255).collect())
    }
}

/// One event to append, already reduced to storage form.
#[derive(Debug, Clone)]
pub struct NewAuthEvent {
    pub user_id: Option<i32>,
    pub kind: AuthEventKind,
    pub email_normalized: Option<String>,
    pub success: bool,
    pub details: Option<serde_json::Value>,
    pub request_ip: Option<Vec<u8>>,
    pub user_agent: Option<String>,
}

/// Appends an event on any connection, so transactional flows
/// (registration) can write their event inside their own transaction.
pub(crate) async fn append_on<C: ConnectionTrait>(
    conn: &C,
    event: NewAuthEvent,
) -> Result<(), sea_orm::DbErr> {
    let row = auth_events::ActiveModel {
        user_id: Set(event.user_id),
        event_type: Set(event.kind.as_str().to_string()),
        email_normalized: Set(event.email_normalized),
        success: Set(event.success),
        request_ip: Set(event.request_ip),
        user_agent: Set(event.user_agent),
        details: Set(event.details.map(|d| d.to_string())),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    row.insert(conn).await?;
    Ok(())
}

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Append one event. Rows are never updated or removed afterwards.
    pub async fn append(&self, event: NewAuthEvent) -> Result<()> {
        append_on(&self.conn, event)
            .await
            .context("Failed to append auth event")
    }

    /// Newest events first, for forensic listings. The auth flows
    /// themselves never call this.
    pub async fn recent(&self, limit: u64) -> Result<Vec<auth_events::Model>> {
        auth_events::Entity::find()
            .order_by_desc(auth_events::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list auth events")
    }
}
