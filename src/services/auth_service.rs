//! Domain service for authentication and account security.
//!
//! Covers login with progressive lockout, logout, registration with
//! email verification, verification resend, password change, and
//! profile updates. Every flow writes its audit events through the
//! shared [`AuditTrail`](crate::services::AuditTrail).

use serde::Serialize;
use thiserror::Error;

use crate::db::RequestContext;

/// Errors specific to authentication operations. The display strings are
/// the user-facing messages; branches that would enable account
/// enumeration share the generic [`AuthError::InvalidCredentials`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("This account is disabled")]
    AccountDisabled,

    #[error("Too many failed attempts; the account is temporarily locked")]
    AccountLocked,

    #[error("This email address has not been verified yet")]
    EmailNotVerified,

    #[error("This verification link has expired or was already used")]
    InvalidToken,

    #[error("This email address is already in use")]
    EmailTaken,

    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Session key presented by the client, rotated away on success.
    pub prior_session_key: Option<String>,
}

/// Identity bound to the freshly established session.
#[derive(Debug, Clone, Serialize)]
pub struct LoginSuccess {
    pub user_id: i32,
    pub email: String,
    pub role: String,
    pub session_key: String,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegisterSuccess {
    pub user_id: i32,
    pub cabinet_id: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifiedEmail {
    pub user_id: i32,
    pub email_normalized: String,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Runs the login ladder: existence, status, lock, password,
    /// verification, success. Exactly one audit event per attempt (two
    /// when the attempt newly locks the account).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for both unknown emails
    /// and wrong passwords; the more specific variants only where the
    /// flow deliberately reveals more.
    async fn login(
        &self,
        request: LoginRequest,
        context: &RequestContext,
    ) -> Result<LoginSuccess, AuthError>;

    /// Records a `logout` event when the key still resolves, then
    /// destroys the session unconditionally.
    async fn logout(&self, session_key: &str, context: &RequestContext) -> Result<(), AuthError>;

    /// Creates the account, its `register` event, the first verification
    /// token, and the default cabinet with its titulaire actor, in one
    /// transaction. The raw token goes to the mailer after commit.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmailTaken`] when the normalized email
    /// already exists; [`AuthError::Validation`] before any state change.
    async fn register(
        &self,
        request: RegisterRequest,
        context: &RequestContext,
    ) -> Result<RegisterSuccess, AuthError>;

    /// Consumes a raw verification token. At most one consumption per
    /// token ever succeeds, concurrent attempts included.
    async fn verify_email(
        &self,
        raw_token: &str,
        context: &RequestContext,
    ) -> Result<VerifiedEmail, AuthError>;

    /// Issues a fresh token when the account exists and is unverified.
    /// The outcome is indistinguishable to the caller either way.
    async fn resend_verification(
        &self,
        email: &str,
        context: &RequestContext,
    ) -> Result<(), AuthError>;

    /// Rotates the credential after re-checking the current password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::WrongCurrentPassword`] (audited) or
    /// [`AuthError::Validation`] for a too-short or mismatched new password.
    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
        context: &RequestContext,
    ) -> Result<(), AuthError>;

    /// Updates the display names. Not audited.
    async fn update_profile(
        &self,
        user_id: i32,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<(), AuthError>;
}
