//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::warn;

use crate::config::{Config, SecurityConfig};
use crate::db::repositories::user::{hash_password, verify_password};
use crate::db::{AuthEventKind, NewRegistration, NewToken, RegistrationOutcome, RequestContext, Store};
use crate::db::repositories::token::{generate_raw_token, hash_token};
use crate::lockout::{self, LockoutPolicy};
use crate::services::audit::AuditTrail;
use crate::services::auth_service::{
    AuthError, AuthService, LoginRequest, LoginSuccess, RegisterRequest, RegisterSuccess,
    VerifiedEmail,
};
use crate::services::mailer::VerificationMailer;
use crate::services::session::SessionManager;
use crate::validation;
use async_trait::async_trait;

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    lockout: LockoutPolicy,
    verify_token_ttl_minutes: i64,
    sessions: SessionManager,
    audit: AuditTrail,
    mailer: Arc<dyn VerificationMailer>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, config: &Config, mailer: Arc<dyn VerificationMailer>) -> Self {
        Self {
            security: config.security.clone(),
            lockout: LockoutPolicy::from_config(&config.auth),
            verify_token_ttl_minutes: config.auth.verify_token_ttl_minutes,
            sessions: SessionManager::new(store.clone(), config.auth.session_ttl_minutes),
            audit: AuditTrail::new(store.clone()),
            store,
            mailer,
        }
    }

    /// Argon2 is deliberately expensive; keep it off the async workers.
    async fn hash_password_blocking(&self, password: String) -> Result<String, AuthError> {
        let security = self.security.clone();

        tokio::task::spawn_blocking(move || hash_password(&password, &security))
            .await
            .map_err(|e| AuthError::Internal(format!("Hashing task failed: {e}")))?
            .map_err(AuthError::from)
    }

    async fn verify_password_blocking(
        password: String,
        stored_hash: String,
    ) -> Result<bool, AuthError> {
        tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Verification task failed: {e}")))
    }

    /// Post-commit handoff; a delivery failure must not undo the
    /// committed registration, so it is logged and swallowed.
    async fn deliver_token(&self, recipient: &str, raw_token: &str) {
        if let Err(err) = self.mailer.deliver(recipient, raw_token).await {
            warn!(error = %err, "Failed to hand off verification token for delivery");
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(
        &self,
        request: LoginRequest,
        context: &RequestContext,
    ) -> Result<LoginSuccess, AuthError> {
        let email_normalized = validation::normalize_email(&request.email);

        // 1. Existence. The caller sees the same generic failure as for
        // a wrong password.
        let Some((account, stored_hash)) = self
            .store
            .get_account_by_email_with_password(&email_normalized)
            .await?
        else {
            self.audit
                .record(
                    AuthEventKind::LoginFailed,
                    false,
                    None,
                    Some(email_normalized),
                    Some(json!({ "reason": "unknown_email" })),
                    context,
                )
                .await?;
            return Err(AuthError::InvalidCredentials);
        };

        // 2. Status.
        if !account.is_active() {
            self.audit
                .record(
                    AuthEventKind::LoginFailed,
                    false,
                    Some(account.id),
                    Some(email_normalized),
                    Some(json!({ "reason": format!("status_{}", account.status) })),
                    context,
                )
                .await?;
            return Err(AuthError::AccountDisabled);
        }

        // 3. Lock, checked before the password so a locked account stays
        // locked even when the credentials are right.
        let now = Utc::now();
        if lockout::is_locked(account.locked_until, now) {
            self.audit
                .record(
                    AuthEventKind::LoginFailed,
                    false,
                    Some(account.id),
                    Some(email_normalized),
                    Some(json!({ "reason": "locked", "locked_until": account.locked_until })),
                    context,
                )
                .await?;
            return Err(AuthError::AccountLocked);
        }

        // 4. Password.
        let password_ok =
            Self::verify_password_blocking(request.password, stored_hash).await?;

        if !password_ok {
            let decision = self.lockout.after_failure(account.failed_login_count, now);

            self.store
                .record_login_failure(account.id, decision.failed_count, decision.locked_until)
                .await?;

            self.audit
                .record(
                    AuthEventKind::LoginFailed,
                    false,
                    Some(account.id),
                    Some(email_normalized.clone()),
                    Some(json!({
                        "reason": "bad_password",
                        "failed_count": decision.failed_count,
                        "locked_until": decision.locked_until,
                    })),
                    context,
                )
                .await?;

            if decision.triggers_lock() {
                self.audit
                    .record(
                        AuthEventKind::AccountLocked,
                        true,
                        Some(account.id),
                        Some(email_normalized),
                        Some(json!({ "locked_until": decision.locked_until })),
                        context,
                    )
                    .await?;
                return Err(AuthError::AccountLocked);
            }

            return Err(AuthError::InvalidCredentials);
        }

        // 5. Verification.
        if !account.email_verified {
            self.audit
                .record(
                    AuthEventKind::LoginFailed,
                    false,
                    Some(account.id),
                    Some(email_normalized),
                    Some(json!({ "reason": "email_not_verified" })),
                    context,
                )
                .await?;
            return Err(AuthError::EmailNotVerified);
        }

        // 6. Success: reset the failure bookkeeping and rotate the
        // session key so a pre-login key can never ride along.
        self.store.record_login_success(account.id).await?;

        let session = self
            .sessions
            .establish(
                request.prior_session_key.as_deref(),
                account.id,
                &account.email,
                &account.role,
            )
            .await?;

        self.audit
            .record(
                AuthEventKind::LoginSuccess,
                true,
                Some(account.id),
                Some(email_normalized),
                None,
                context,
            )
            .await?;

        Ok(LoginSuccess {
            user_id: account.id,
            email: account.email,
            role: account.role,
            session_key: session.key,
        })
    }

    async fn logout(&self, session_key: &str, context: &RequestContext) -> Result<(), AuthError> {
        if let Some(session) = self.sessions.current_user(session_key).await? {
            self.audit
                .record(
                    AuthEventKind::Logout,
                    true,
                    Some(session.user_id),
                    Some(validation::normalize_email(&session.email)),
                    None,
                    context,
                )
                .await?;
        }

        self.sessions.destroy(session_key).await?;
        Ok(())
    }

    async fn register(
        &self,
        request: RegisterRequest,
        context: &RequestContext,
    ) -> Result<RegisterSuccess, AuthError> {
        if !validation::is_valid_email(&request.email) {
            return Err(AuthError::Validation(
                "A valid email address is required".to_string(),
            ));
        }

        if !validation::meets_password_length(&request.password) {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                validation::MIN_PASSWORD_CHARS
            )));
        }

        if request.password != request.password_confirmation {
            return Err(AuthError::Validation(
                "Password confirmation does not match".to_string(),
            ));
        }

        let first_name = validation::normalize_name(request.first_name.as_deref());
        let last_name = validation::normalize_name(request.last_name.as_deref());

        if !validation::name_within_limit(first_name.as_deref())
            || !validation::name_within_limit(last_name.as_deref())
        {
            return Err(AuthError::Validation(format!(
                "Names must be at most {} characters",
                validation::MAX_NAME_CHARS
            )));
        }

        let email = request.email.trim().to_string();
        let email_normalized = validation::normalize_email(&email);

        let password_hash = self.hash_password_blocking(request.password).await?;

        let raw_token = generate_raw_token();
        let token_expires_at = Utc::now() + Duration::minutes(self.verify_token_ttl_minutes);

        let outcome = self
            .store
            .register_account(NewRegistration {
                email: email.clone(),
                email_normalized,
                password_hash,
                first_name,
                last_name,
                token_hash: hash_token(&raw_token),
                token_expires_at,
                request_ip: context.ip_bytes(),
                user_agent: context.user_agent_trimmed(),
            })
            .await?;

        let created = match outcome {
            RegistrationOutcome::Created(created) => created,
            RegistrationOutcome::EmailTaken => return Err(AuthError::EmailTaken),
        };

        self.deliver_token(&email, &raw_token).await;

        Ok(RegisterSuccess {
            user_id: created.user_id,
            cabinet_id: created.cabinet_id,
        })
    }

    async fn verify_email(
        &self,
        raw_token: &str,
        context: &RequestContext,
    ) -> Result<VerifiedEmail, AuthError> {
        // Shape failures never reach the store and are not audited.
        if !validation::is_valid_token(raw_token) {
            return Err(AuthError::Validation(
                "Malformed verification token".to_string(),
            ));
        }

        let consumed = self
            .store
            .consume_verification_token(&hash_token(raw_token))
            .await?;

        let Some(verified) = consumed else {
            self.audit
                .record(
                    AuthEventKind::EmailVerified,
                    false,
                    None,
                    None,
                    Some(json!({ "reason": "invalid_or_expired_token" })),
                    context,
                )
                .await?;
            return Err(AuthError::InvalidToken);
        };

        self.audit
            .record(
                AuthEventKind::EmailVerified,
                true,
                Some(verified.user_id),
                Some(verified.email_normalized.clone()),
                None,
                context,
            )
            .await?;

        Ok(VerifiedEmail {
            user_id: verified.user_id,
            email_normalized: verified.email_normalized,
        })
    }

    async fn resend_verification(
        &self,
        email: &str,
        context: &RequestContext,
    ) -> Result<(), AuthError> {
        if !validation::is_valid_email(email) {
            return Err(AuthError::Validation(
                "A valid email address is required".to_string(),
            ));
        }

        let email_normalized = validation::normalize_email(email);

        let account = self
            .store
            .get_account_by_email(&email_normalized)
            .await?
            .filter(|account| !account.email_verified);

        // Unknown and already-verified addresses take the no-action path;
        // the caller cannot tell the difference.
        let Some(account) = account else {
            self.audit
                .record(
                    AuthEventKind::RegisterVerifySent,
                    true,
                    None,
                    Some(email_normalized),
                    Some(json!({ "note": "no_action" })),
                    context,
                )
                .await?;
            return Ok(());
        };

        let raw_token = generate_raw_token();
        let expires_at = Utc::now() + Duration::minutes(self.verify_token_ttl_minutes);

        self.store
            .issue_verification_token(NewToken {
                user_id: account.id,
                token_hash: hash_token(&raw_token),
                expires_at,
                request_ip: context.ip_bytes(),
                user_agent: context.user_agent_trimmed(),
            })
            .await?;

        self.audit
            .record(
                AuthEventKind::RegisterVerifySent,
                true,
                Some(account.id),
                Some(email_normalized),
                None,
                context,
            )
            .await?;

        self.deliver_token(&account.email, &raw_token).await;

        Ok(())
    }

    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
        context: &RequestContext,
    ) -> Result<(), AuthError> {
        if !validation::meets_password_length(new_password) {
            return Err(AuthError::Validation(format!(
                "New password must be at least {} characters",
                validation::MIN_PASSWORD_CHARS
            )));
        }

        if new_password != confirmation {
            return Err(AuthError::Validation(
                "Password confirmation does not match".to_string(),
            ));
        }

        let (account, stored_hash) = self
            .store
            .get_account_by_id_with_password(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let current_ok =
            Self::verify_password_blocking(current_password.to_string(), stored_hash).await?;

        if !current_ok {
            self.audit
                .record(
                    AuthEventKind::LoginFailed,
                    false,
                    Some(account.id),
                    Some(account.email_normalized),
                    Some(json!({ "reason": "wrong_current_password_on_change" })),
                    context,
                )
                .await?;
            return Err(AuthError::WrongCurrentPassword);
        }

        let new_hash = self.hash_password_blocking(new_password.to_string()).await?;

        self.store.update_password_hash(account.id, &new_hash).await?;

        self.audit
            .record(
                AuthEventKind::PasswordResetSuccess,
                true,
                Some(account.id),
                Some(validation::normalize_email(&account.email)),
                None,
                context,
            )
            .await?;

        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: i32,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<(), AuthError> {
        let first_name = validation::normalize_name(first_name);
        let last_name = validation::normalize_name(last_name);

        if !validation::name_within_limit(first_name.as_deref())
            || !validation::name_within_limit(last_name.as_deref())
        {
            return Err(AuthError::Validation(format!(
                "Names must be at most {} characters",
                validation::MAX_NAME_CHARS
            )));
        }

        self.store
            .update_profile_names(user_id, first_name, last_name)
            .await?;

        Ok(())
    }
}
