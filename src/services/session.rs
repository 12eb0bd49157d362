//! Server-side session management.
//!
//! Clients only ever hold the opaque key; the bound identity lives in
//! the `sessions` table. A fresh key is issued on every successful
//! login (session-fixation defense) and expiry slides on each lookup.

use anyhow::Result;

use crate::db::{SessionRecord, Store};
use crate::services::auth_service::AuthError;

#[derive(Clone)]
pub struct SessionManager {
    store: Store,
    ttl_minutes: i64,
}

impl SessionManager {
    #[must_use]
    pub const fn new(store: Store, ttl_minutes: i64) -> Self {
        Self { store, ttl_minutes }
    }

    /// Bind a fresh session to the given identity, invalidating the key
    /// the client presented before logging in (if any). Must run on
    /// every successful login; keys are never reused.
    pub async fn establish(
        &self,
        prior_key: Option<&str>,
        user_id: i32,
        email: &str,
        role: &str,
    ) -> Result<SessionRecord> {
        if let Some(key) = prior_key {
            self.store.delete_session(key).await?;
        }

        self.store
            .create_session(user_id, email, role, self.ttl_minutes)
            .await
    }

    /// Remove the session row. Idempotent; unknown keys are a no-op.
    pub async fn destroy(&self, key: &str) -> Result<()> {
        self.store.delete_session(key).await
    }

    /// Resolve a key to its identity, refreshing the sliding expiry.
    /// Expired rows read as absent.
    pub async fn current_user(&self, key: &str) -> Result<Option<SessionRecord>> {
        self.store.find_live_session(key, self.ttl_minutes).await
    }

    pub async fn current_user_id(&self, key: &str) -> Result<Option<i32>> {
        Ok(self.current_user(key).await?.map(|s| s.user_id))
    }

    /// The redirect-or-fail gate used by every authenticated route
    /// outside the auth core.
    pub async fn require_authenticated(&self, key: &str) -> Result<SessionRecord, AuthError> {
        self.current_user(key)
            .await?
            .ok_or(AuthError::Unauthorized)
    }

    /// Wizard-owned slot; opaque to the auth core.
    pub async fn active_cabinet_id(&self, key: &str) -> Result<Option<i32>> {
        Ok(self
            .current_user(key)
            .await?
            .and_then(|s| s.active_cabinet_id))
    }

    pub async fn set_active_cabinet(&self, key: &str, cabinet_id: Option<i32>) -> Result<()> {
        self.store.set_session_active_cabinet(key, cabinet_id).await
    }
}
