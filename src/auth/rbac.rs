/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Access rules for the marketplace: trading roles, the three admin levels
 * and the capability flags carried by employee sessions.
 */

use super::AuthUser;
use crate::entities::user::Role;
use crate::errors::ServiceError;

/// Full control.
pub const ADMIN_LEVEL_FULL: i32 = 1;
/// May register non-admin users and level-3 admins.
pub const ADMIN_LEVEL_LIMITED: i32 = 2;
/// Read-only.
pub const ADMIN_LEVEL_READ_ONLY: i32 = 3;

/// Capability flags an owner grants to an employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Capability {
    #[strum(to_string = "can_manage_inventory")]
    ManageInventory,
    #[strum(to_string = "can_manage_orders")]
    ManageOrders,
    #[strum(to_string = "can_chat")]
    Chat,
    #[strum(to_string = "can_change_status")]
    ChangeStatus,
    #[strum(to_string = "can_rate")]
    Rate,
}

/// Capability set of an employee session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Capabilities {
    pub can_manage_inventory: bool,
    pub can_manage_orders: bool,
    pub can_chat: bool,
    pub can_change_status: bool,
    pub can_rate: bool,
}

impl Capabilities {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageInventory => self.can_manage_inventory,
            Capability::ManageOrders => self.can_manage_orders,
            Capability::Chat => self.can_chat,
            Capability::ChangeStatus => self.can_change_status,
            Capability::Rate => self.can_rate,
        }
    }
}

impl AuthUser {
    /// Admin level with a missing value treated as full control.
    pub fn effective_admin_level(&self) -> i32 {
        self.admin_level.unwrap_or(ADMIN_LEVEL_FULL)
    }

    /// Admins whose level is at most `max_level` pass.
    pub fn require_admin_level(&self, max_level: i32) -> Result<(), ServiceError> {
        if self.role != Role::Admin {
            return Err(ServiceError::Forbidden(
                "only admin can access this resource".into(),
            ));
        }
        if self.effective_admin_level() > max_level {
            return Err(ServiceError::Forbidden("insufficient admin level".into()));
        }
        Ok(())
    }

    /// Owners always pass; employees need the flag.
    pub fn has_capability(&self, capability: Capability) -> bool {
        match &self.employee {
            Some(scope) => scope.capabilities.allows(capability),
            None => true,
        }
    }

    pub fn require_capability(&self, capability: Capability) -> Result<(), ServiceError> {
        if self.has_capability(capability) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "insufficient employee permission: {}",
                capability
            )))
        }
    }

    /// Fails with `Forbidden(message)` unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[Role], message: &str) -> Result<(), ServiceError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(message.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::EmployeeScope;
    use rstest::rstest;

    fn user(role: Role, admin_level: Option<i32>) -> AuthUser {
        AuthUser {
            user_id: 1,
            email: "a@example.com".into(),
            role,
            admin_level,
            employee: None,
        }
    }

    #[rstest]
    #[case(Role::Admin, None, 1, true)]
    #[case(Role::Admin, Some(1), 1, true)]
    #[case(Role::Admin, Some(2), 1, false)]
    #[case(Role::Admin, Some(2), 2, true)]
    #[case(Role::Admin, Some(3), 2, false)]
    #[case(Role::Admin, Some(3), 3, true)]
    #[case(Role::Supplier, None, 3, false)]
    #[case(Role::Store, Some(1), 3, false)]
    fn admin_level_gating(
        #[case] role: Role,
        #[case] level: Option<i32>,
        #[case] max: i32,
        #[case] allowed: bool,
    ) {
        assert_eq!(user(role, level).require_admin_level(max).is_ok(), allowed);
    }

    #[test]
    fn non_admin_gets_role_message() {
        let err = user(Role::Store, None).require_admin_level(3).unwrap_err();
        assert_eq!(err.to_string(), "only admin can access this resource");
        let err = user(Role::Admin, Some(3)).require_admin_level(1).unwrap_err();
        assert_eq!(err.to_string(), "insufficient admin level");
    }

    #[rstest]
    #[case(Capability::ManageInventory, false)]
    #[case(Capability::ManageOrders, true)]
    #[case(Capability::Chat, true)]
    #[case(Capability::ChangeStatus, false)]
    #[case(Capability::Rate, false)]
    fn employee_capabilities(#[case] capability: Capability, #[case] allowed: bool) {
        let mut u = user(Role::Store, None);
        u.employee = Some(EmployeeScope {
            employee_id: 9,
            capabilities: Capabilities {
                can_manage_orders: true,
                can_chat: true,
                ..Default::default()
            },
        });
        assert_eq!(u.require_capability(capability).is_ok(), allowed);
        if !allowed {
            assert_eq!(
                u.require_capability(capability).unwrap_err().to_string(),
                format!("insufficient employee permission: {}", capability)
            );
        }
    }

    #[test]
    fn owners_hold_every_capability() {
        let owner = user(Role::Supplier, None);
        assert!(owner.has_capability(Capability::Rate));
        assert_eq!(Capability::ManageOrders.to_string(), "can_manage_orders");
    }
}
