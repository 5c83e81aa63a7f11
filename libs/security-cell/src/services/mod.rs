pub mod password;
pub mod policy;
pub mod validation;

pub use password::PasswordSecurityService;
pub use validation::ValidationService;
