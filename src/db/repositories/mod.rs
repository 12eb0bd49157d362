pub mod audit;
pub mod session;
pub mod token;
pub mod user;
