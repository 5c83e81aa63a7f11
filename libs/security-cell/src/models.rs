use std::fmt;

use serde::Serialize;

// =====================================================================================
// ACCESS POLICY MODELS
// =====================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    /// Recording a payment against a billing.
    Pay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Patient,
    Visit,
    MedicalRecord,
    Medicine,
    Billing,
    User,
    Dashboard,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Pay => "record payments for",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Patient => "patients",
            Resource::Visit => "visits",
            Resource::MedicalRecord => "medical records",
            Resource::Medicine => "medicines",
            Resource::Billing => "billings",
            Resource::User => "users",
            Resource::Dashboard => "the dashboard",
        };
        f.write_str(name)
    }
}

// =====================================================================================
// PASSWORD MODELS
// =====================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PasswordStrengthResult {
    pub strength: PasswordStrength,
    pub score: u8,
    pub issues: Vec<String>,
}

impl PasswordStrengthResult {
    pub fn is_acceptable(&self) -> bool {
        !matches!(self.strength, PasswordStrength::Weak)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PasswordStrength {
    Weak,
    Fair,
    Good,
    Strong,
}
