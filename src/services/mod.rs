pub mod audit;
pub use audit::AuditTrail;

pub mod auth_service;
pub use auth_service::{
    AuthError, AuthService, LoginRequest, LoginSuccess, RegisterRequest, RegisterSuccess,
    VerifiedEmail,
};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod mailer;
pub use mailer::{LinkLogMailer, VerificationMailer};

pub mod session;
pub use session::SessionManager;
