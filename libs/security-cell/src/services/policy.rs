// =====================================================================================
// ACCESS POLICY - WHICH ROLES MAY DO WHAT
// =====================================================================================

use tracing::warn;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{Action, Resource};

const STAFF: &[Role] = &[
    Role::Admin,
    Role::Doctor,
    Role::Nurse,
    Role::FrontDesk,
    Role::Pharmacy,
    Role::Laboratory,
];

const ADMIN: &[Role] = &[Role::Admin];
const ADMIN_FRONT_DESK: &[Role] = &[Role::Admin, Role::FrontDesk];
const ADMIN_DOCTOR: &[Role] = &[Role::Admin, Role::Doctor];
const ADMIN_PHARMACY: &[Role] = &[Role::Admin, Role::Pharmacy];
const CLINICAL: &[Role] = &[Role::Admin, Role::Doctor, Role::Nurse];
const VISIT_DESK: &[Role] = &[Role::Admin, Role::Doctor, Role::Nurse, Role::FrontDesk];
const NOBODY: &[Role] = &[];

/// Roles granted `action` on `resource`.
pub fn allowed_roles(action: Action, resource: Resource) -> &'static [Role] {
    use Action::*;

    match (resource, action) {
        (_, Pay) if resource != Resource::Billing => NOBODY,

        (Resource::Patient, Read) => &[
            Role::Admin,
            Role::Doctor,
            Role::Nurse,
            Role::FrontDesk,
            Role::Laboratory,
        ],
        (Resource::Patient, Create | Update) => ADMIN_FRONT_DESK,
        (Resource::Patient, Delete) => ADMIN,

        (Resource::Visit, Read | Update) => VISIT_DESK,
        (Resource::Visit, Create | Delete) => ADMIN_FRONT_DESK,

        (Resource::MedicalRecord, Read) => CLINICAL,
        (Resource::MedicalRecord, Create | Update) => ADMIN_DOCTOR,
        (Resource::MedicalRecord, Delete) => ADMIN,

        (Resource::Medicine, Read) => &[Role::Admin, Role::Doctor, Role::Nurse, Role::Pharmacy],
        (Resource::Medicine, Create | Update | Delete) => ADMIN_PHARMACY,

        (Resource::Billing, Read | Create | Update | Pay) => ADMIN_FRONT_DESK,
        (Resource::Billing, Delete) => ADMIN,

        (Resource::User, _) => ADMIN,

        (Resource::Dashboard, Read) => STAFF,
        (Resource::Dashboard, _) => NOBODY,

        (_, Pay) => NOBODY,
    }
}

pub fn can(user: &User, action: Action, resource: Resource) -> bool {
    allowed_roles(action, resource).contains(&user.role)
}

/// Same decision as [`can`], shaped for handlers that propagate with `?`.
pub fn authorize(user: &User, action: Action, resource: Resource) -> Result<(), AppError> {
    if can(user, action, resource) {
        return Ok(());
    }

    warn!(
        "Denied {} ({}) attempting to {} {}",
        user.id, user.role, action, resource
    );
    Err(AppError::Forbidden(format!(
        "Role {} is not allowed to {} {}",
        user.role, action, resource
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{}@hospital.test", role.as_str().to_lowercase()),
            role,
        }
    }

    #[test]
    fn test_admin_can_do_everything_except_pay_outside_billing() {
        let admin = user(Role::Admin);
        let resources = [
            Resource::Patient,
            Resource::Visit,
            Resource::MedicalRecord,
            Resource::Medicine,
            Resource::Billing,
            Resource::User,
        ];

        for resource in resources {
            for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
                assert!(can(&admin, action, resource), "{} {}", action, resource);
            }
        }
        assert!(can(&admin, Action::Pay, Resource::Billing));
        assert!(!can(&admin, Action::Pay, Resource::Patient));
    }

    #[test]
    fn test_patients_hold_no_staff_capabilities() {
        let patient = user(Role::Patient);

        assert!(!can(&patient, Action::Read, Resource::Patient));
        assert!(!can(&patient, Action::Read, Resource::Dashboard));
        assert!(!can(&patient, Action::Read, Resource::MedicalRecord));
    }

    #[test]
    fn test_clinical_record_access() {
        assert!(can(&user(Role::Doctor), Action::Create, Resource::MedicalRecord));
        assert!(can(&user(Role::Nurse), Action::Read, Resource::MedicalRecord));
        assert!(!can(&user(Role::Nurse), Action::Create, Resource::MedicalRecord));
        assert!(!can(&user(Role::FrontDesk), Action::Read, Resource::MedicalRecord));
        assert!(!can(&user(Role::Doctor), Action::Delete, Resource::MedicalRecord));
    }

    #[test]
    fn test_pharmacy_manages_medicines_only() {
        let pharmacist = user(Role::Pharmacy);

        assert!(can(&pharmacist, Action::Create, Resource::Medicine));
        assert!(can(&pharmacist, Action::Delete, Resource::Medicine));
        assert!(!can(&pharmacist, Action::Read, Resource::Patient));
        assert!(!can(&pharmacist, Action::Read, Resource::Billing));
    }

    #[test]
    fn test_front_desk_handles_registration_and_billing() {
        let desk = user(Role::FrontDesk);

        assert!(can(&desk, Action::Create, Resource::Patient));
        assert!(can(&desk, Action::Create, Resource::Visit));
        assert!(can(&desk, Action::Pay, Resource::Billing));
        assert!(!can(&desk, Action::Delete, Resource::Patient));
        assert!(!can(&desk, Action::Delete, Resource::Billing));
        assert!(!can(&desk, Action::Read, Resource::User));
    }

    #[test]
    fn test_every_staff_role_sees_the_dashboard() {
        for role in Role::ALL {
            assert_eq!(can(&user(role), Action::Read, Resource::Dashboard), role.is_staff());
        }
    }

    #[test]
    fn test_authorize_reports_forbidden() {
        let nurse = user(Role::Nurse);

        assert!(authorize(&nurse, Action::Read, Resource::Patient).is_ok());
        assert_matches!(
            authorize(&nurse, Action::Delete, Resource::Patient),
            Err(AppError::Forbidden(msg)) if msg == "Role NURSE is not allowed to delete patients"
        );
    }
}
