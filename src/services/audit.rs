//! Shared audit sink over the append-only `auth_events` ledger.
//!
//! Every security-relevant flow writes through here; the writers never
//! read events back. `recent` exists for operational forensics only.

use anyhow::Result;

use crate::db::{AuthEvent, AuthEventKind, NewAuthEvent, RequestContext, Store};

#[derive(Clone)]
pub struct AuditTrail {
    store: Store,
}

impl AuditTrail {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Append one event with the request's client metadata attached.
    pub async fn record(
        &self,
        kind: AuthEventKind,
        success: bool,
        user_id: Option<i32>,
        email_normalized: Option<String>,
        details: Option<serde_json::Value>,
        context: &RequestContext,
    ) -> Result<()> {
        self.store
            .record_auth_event(NewAuthEvent {
                user_id,
                kind,
                email_normalized,
                success,
                details,
                request_ip: context.ip_bytes(),
                user_agent: context.user_agent_trimmed(),
            })
            .await
    }

    /// Newest events first.
    pub async fn recent(&self, limit: u64) -> Result<Vec<AuthEvent>> {
        self.store.recent_auth_events(limit).await
    }
}
