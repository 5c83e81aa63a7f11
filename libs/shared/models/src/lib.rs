pub mod auth;
pub mod error;
pub mod identifiers;
pub mod response;
