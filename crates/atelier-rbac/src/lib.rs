//! Role-based access control for the Atelier back office.
//!
//! Permissions are never persisted; they are derived at lookup time from the
//! static role table below, so the table is the only place that can grant a
//! capability.

use std::str::FromStr;

/// Privilege tier assigned to a back-office user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Member,
    Admin,
    MasterAdmin,
}

/// Error type for parsing Role from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(pub String);

impl std::fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid role: {}", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MEMBER" => Ok(Role::Member),
            "ADMIN" => Ok(Role::Admin),
            "MASTER_ADMIN" => Ok(Role::MasterAdmin),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// A named capability derived from a role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewUsers,
    ManageUsers,
    ViewInvitations,
    CreateInvitations,
    CancelInvitations,
    ResendInvitations,
    ViewSettings,
    UpdateSettings,
    ViewDashboard,
    ViewAnalytics,
    ViewProducts,
    ManageProducts,
}

const MEMBER_PERMISSIONS: &[Permission] = &[Permission::ViewDashboard, Permission::ViewProducts];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ViewDashboard,
    Permission::ViewProducts,
    Permission::ViewUsers,
    Permission::ViewInvitations,
    Permission::CreateInvitations,
    Permission::CancelInvitations,
    Permission::ResendInvitations,
    Permission::ViewSettings,
    Permission::ViewAnalytics,
    Permission::ManageProducts,
];

const MASTER_ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ViewDashboard,
    Permission::ViewProducts,
    Permission::ViewUsers,
    Permission::ViewInvitations,
    Permission::CreateInvitations,
    Permission::CancelInvitations,
    Permission::ResendInvitations,
    Permission::ViewSettings,
    Permission::ViewAnalytics,
    Permission::ManageProducts,
    Permission::ManageUsers,
    Permission::UpdateSettings,
];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Admin => "ADMIN",
            Role::MasterAdmin => "MASTER_ADMIN",
        }
    }

    /// Numeric privilege level (MEMBER:1, ADMIN:2, MASTER_ADMIN:3).
    pub fn hierarchy_level(&self) -> u8 {
        match self {
            Role::Member => 1,
            Role::Admin => 2,
            Role::MasterAdmin => 3,
        }
    }

    /// The full permission set granted by this role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Member => MEMBER_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
            Role::MasterAdmin => MASTER_ADMIN_PERMISSIONS,
        }
    }

    /// Check if this role grants the permission.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Check if this role grants at least one of the permissions.
    pub fn has_any_permission(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has_permission(*p))
    }

    /// Check if this role grants every one of the permissions.
    pub fn has_all_permissions(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.has_permission(*p))
    }

    /// Check if this role sits at or above another role in the hierarchy.
    pub fn has_higher_or_equal(&self, other: &Role) -> bool {
        self.hierarchy_level() >= other.hierarchy_level()
    }
}

/// Membership test against the fixed role set. Rejects malformed input
/// before any store access; unknown strings fail closed.
pub fn is_valid_role(candidate: &str) -> bool {
    candidate.parse::<Role>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [Role::Member, Role::Admin, Role::MasterAdmin] {
            let s = role.as_str();
            let parsed: Role = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_role_parse_invalid() {
        assert!("invalid".parse::<Role>().is_err());
        assert!("admin".parse::<Role>().is_err()); // Case sensitive
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_is_valid_role() {
        assert!(is_valid_role("MEMBER"));
        assert!(is_valid_role("ADMIN"));
        assert!(is_valid_role("MASTER_ADMIN"));
        assert!(!is_valid_role("SUPER_ADMIN"));
        assert!(!is_valid_role("member"));
    }

    #[test]
    fn test_hierarchy_levels() {
        assert_eq!(Role::Member.hierarchy_level(), 1);
        assert_eq!(Role::Admin.hierarchy_level(), 2);
        assert_eq!(Role::MasterAdmin.hierarchy_level(), 3);
    }

    #[test]
    fn test_has_higher_or_equal() {
        assert!(Role::MasterAdmin.has_higher_or_equal(&Role::Admin));
        assert!(Role::Admin.has_higher_or_equal(&Role::Admin));
        assert!(Role::Admin.has_higher_or_equal(&Role::Member));
        assert!(!Role::Member.has_higher_or_equal(&Role::Admin));
        assert!(!Role::Admin.has_higher_or_equal(&Role::MasterAdmin));
    }

    #[test]
    fn test_member_permissions() {
        assert!(Role::Member.has_permission(Permission::ViewDashboard));
        assert!(Role::Member.has_permission(Permission::ViewProducts));
        assert!(!Role::Member.has_permission(Permission::ViewUsers));
        assert!(!Role::Member.has_permission(Permission::CreateInvitations));
        assert!(!Role::Member.has_permission(Permission::ManageUsers));
    }

    #[test]
    fn test_admin_permissions() {
        assert!(Role::Admin.has_permission(Permission::ViewUsers));
        assert!(Role::Admin.has_permission(Permission::CreateInvitations));
        assert!(Role::Admin.has_permission(Permission::CancelInvitations));
        assert!(Role::Admin.has_permission(Permission::ResendInvitations));
        assert!(Role::Admin.has_permission(Permission::ManageProducts));
        // Reserved for the master admin
        assert!(!Role::Admin.has_permission(Permission::ManageUsers));
        assert!(!Role::Admin.has_permission(Permission::UpdateSettings));
    }

    #[test]
    fn test_master_admin_has_everything() {
        let all = [
            Permission::ViewUsers,
            Permission::ManageUsers,
            Permission::ViewInvitations,
            Permission::CreateInvitations,
            Permission::CancelInvitations,
            Permission::ResendInvitations,
            Permission::ViewSettings,
            Permission::UpdateSettings,
            Permission::ViewDashboard,
            Permission::ViewAnalytics,
            Permission::ViewProducts,
            Permission::ManageProducts,
        ];
        assert!(Role::MasterAdmin.has_all_permissions(&all));
    }

    #[test]
    fn test_hierarchy_is_monotonic() {
        // Each tier's permission set is a superset of the tier below it.
        for p in Role::Member.permissions() {
            assert!(Role::Admin.has_permission(*p), "Admin missing {:?}", p);
        }
        for p in Role::Admin.permissions() {
            assert!(
                Role::MasterAdmin.has_permission(*p),
                "MasterAdmin missing {:?}",
                p
            );
        }
    }

    #[test]
    fn test_has_any_permission() {
        assert!(Role::Member
            .has_any_permission(&[Permission::ManageUsers, Permission::ViewDashboard]));
        assert!(!Role::Member
            .has_any_permission(&[Permission::ManageUsers, Permission::UpdateSettings]));
        assert!(!Role::Member.has_any_permission(&[]));
    }

    #[test]
    fn test_has_all_permissions() {
        assert!(Role::Admin
            .has_all_permissions(&[Permission::ViewUsers, Permission::ViewInvitations]));
        assert!(
            !Role::Admin.has_all_permissions(&[Permission::ViewUsers, Permission::ManageUsers])
        );
        // Vacuously true
        assert!(Role::Member.has_all_permissions(&[]));
    }

    #[test]
    fn test_lookup_is_deterministic() {
        for _ in 0..3 {
            assert!(Role::Admin.has_permission(Permission::CreateInvitations));
            assert!(!Role::Member.has_permission(Permission::CreateInvitations));
        }
    }
}
