//! Role based authorization.
//!
//! Every predicate is pure; services call them before touching storage and
//! turn a `false` into `ServiceError::Unauthorized`.

use crate::{error::ServiceError, models::UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageAssessments,
    ManageQuestions,
    ManageNotes,
    ManageReports,
    SendEmails,
}

impl Capability {
    #[cfg(test)]
    pub const ALL: [Capability; 5] = [
        Capability::ManageAssessments,
        Capability::ManageQuestions,
        Capability::ManageNotes,
        Capability::ManageReports,
        Capability::SendEmails,
    ];

    fn index(self) -> usize {
        match self {
            Capability::ManageAssessments => 0,
            Capability::ManageQuestions => 1,
            Capability::ManageNotes => 2,
            Capability::ManageReports => 3,
            Capability::SendEmails => 4,
        }
    }
}

// rows: admin, coach, user. columns follow Capability::index
const CAPABILITIES: [[bool; 5]; 3] = [
    [true, true, true, true, true],
    [true, true, true, true, true],
    [false, false, false, false, false],
];

fn role_index(role: UserRole) -> usize {
    match role {
        UserRole::Admin => 0,
        UserRole::Coach => 1,
        UserRole::User => 2,
    }
}

pub fn has_capability(role: UserRole, capability: Capability) -> bool {
    CAPABILITIES[role_index(role)][capability.index()]
}

/// Admins and coaches.
pub fn is_manager(role: UserRole) -> bool {
    has_capability(role, Capability::ManageAssessments)
}

/// Roles an actor may hand out when creating or updating users.
pub fn grantable_roles(actor: UserRole) -> &'static [UserRole] {
    match actor {
        UserRole::Admin => &[UserRole::Admin, UserRole::Coach, UserRole::User],
        UserRole::Coach => &[UserRole::Coach, UserRole::User],
        UserRole::User => &[],
    }
}

pub fn can_grant_role(actor: UserRole, role: UserRole) -> bool {
    grantable_roles(actor).contains(&role)
}

pub fn can_create_user(actor: UserRole, new_role: UserRole) -> bool {
    can_grant_role(actor, new_role)
}

pub fn can_delete_user(actor: UserRole, target: UserRole) -> bool {
    match actor {
        UserRole::Admin => true,
        UserRole::Coach => target != UserRole::Admin,
        UserRole::User => false,
    }
}

/// Everyone may modify themselves; otherwise the delete rule applies.
pub fn can_modify_user(actor_id: &str, actor: UserRole, target_id: &str, target: UserRole) -> bool {
    actor_id == target_id || can_delete_user(actor, target)
}

/// Fail with `Unauthorized` unless `role` holds `capability`.
pub fn require(role: UserRole, capability: Capability) -> Result<(), ServiceError> {
    if has_capability(role, capability) {
        Ok(())
    } else {
        Err(ServiceError::unauthorized(
            "You are not allowed to perform this action.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(UserRole::Admin, true)]
    #[case(UserRole::Coach, true)]
    #[case(UserRole::User, false)]
    fn capabilities_follow_manager_role(#[case] role: UserRole, #[case] expected: bool) {
        for capability in Capability::ALL {
            assert_eq!(has_capability(role, capability), expected, "{capability:?}");
        }
        assert_eq!(require(role, Capability::ManageReports).is_ok(), expected);
    }

    #[rstest]
    #[case(UserRole::Admin, UserRole::Admin, true)]
    #[case(UserRole::Admin, UserRole::User, true)]
    #[case(UserRole::Coach, UserRole::Admin, false)]
    #[case(UserRole::Coach, UserRole::Coach, true)]
    #[case(UserRole::Coach, UserRole::User, true)]
    #[case(UserRole::User, UserRole::User, false)]
    fn create_user_rules(#[case] actor: UserRole, #[case] new_role: UserRole, #[case] ok: bool) {
        assert_eq!(can_create_user(actor, new_role), ok);
    }

    #[rstest]
    #[case(UserRole::Admin, UserRole::Admin, true)]
    #[case(UserRole::Coach, UserRole::Admin, false)]
    #[case(UserRole::Coach, UserRole::Coach, true)]
    #[case(UserRole::User, UserRole::User, false)]
    fn delete_user_rules(#[case] actor: UserRole, #[case] target: UserRole, #[case] ok: bool) {
        assert_eq!(can_delete_user(actor, target), ok);
    }

    #[test]
    fn users_can_modify_only_themselves() {
        assert!(can_modify_user("u1", UserRole::User, "u1", UserRole::User));
        assert!(!can_modify_user("u1", UserRole::User, "u2", UserRole::User));
        assert!(!can_modify_user("c1", UserRole::Coach, "a1", UserRole::Admin));
        assert!(can_modify_user("a1", UserRole::Admin, "c1", UserRole::Coach));
    }

    #[test]
    fn grantable_roles_per_actor() {
        assert_eq!(grantable_roles(UserRole::Admin).len(), 3);
        assert_eq!(
            grantable_roles(UserRole::Coach),
            &[UserRole::Coach, UserRole::User]
        );
        assert!(grantable_roles(UserRole::User).is_empty());
    }
}
