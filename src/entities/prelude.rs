pub use super::auth_events::Entity as AuthEvents;
pub use super::cabinet_actors::Entity as CabinetActors;
pub use super::cabinets::Entity as Cabinets;
pub use super::email_verification_tokens::Entity as EmailVerificationTokens;
pub use super::sessions::Entity as Sessions;
pub use super::users::Entity as Users;
