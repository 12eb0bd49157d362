pub mod prelude;

pub mod auth_events;
pub mod cabinet_actors;
pub mod cabinets;
pub mod email_verification_tokens;
pub mod sessions;
pub mod users;
