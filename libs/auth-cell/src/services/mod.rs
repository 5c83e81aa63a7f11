pub mod auth;

pub use auth::{normalize_email, AuthService};
