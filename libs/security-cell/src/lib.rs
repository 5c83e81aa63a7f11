// =====================================================================================
// SECURITY CELL - ACCESS POLICY, PASSWORDS & INPUT VALIDATION
// =====================================================================================
//
// Library cell used by every resource cell:
// - Role-based capability checks: can(user, action, resource)
// - Argon2 password hashing and strength rules
// - Email / phone / required-field validation
//
// =====================================================================================

pub mod models;
pub mod services;

pub use models::{Action, PasswordStrength, PasswordStrengthResult, Resource};

pub use services::{
    policy::{allowed_roles, authorize, can},
    PasswordSecurityService, ValidationService,
};
