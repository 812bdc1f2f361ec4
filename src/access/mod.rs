//! Authorization decisions over an already-loaded [`User`].
//!
//! Every function here is pure and synchronous. A denial is a plain `false`;
//! turning it into an HTTP response is the caller's job.

pub mod permission;
pub mod role;

use uuid::Uuid;

use crate::models::User;

pub use permission::Permission;
pub use role::{Role, UserStatus, role_permissions};

/// True iff `permission` is in the user's stored permission set.
///
/// The role is not consulted.
pub fn has_permission(user: &User, permission: Permission) -> bool {
    user.permissions.contains(&permission)
}

pub fn has_any_permission(user: &User, permissions: &[Permission]) -> bool {
    permissions.iter().any(|p| has_permission(user, *p))
}

pub fn has_all_permissions(user: &User, permissions: &[Permission]) -> bool {
    permissions.iter().all(|p| has_permission(user, *p))
}

/// A super admin with no assigned branches may act on every branch.
pub fn has_all_branches_sentinel(user: &User) -> bool {
    user.role == Role::SuperAdmin && user.assigned_branch_ids.is_empty()
}

pub fn can_access_branch(user: &User, branch_id: Uuid) -> bool {
    has_all_branches_sentinel(user) || user.assigned_branch_ids.contains(&branch_id)
}

/// Branch ids the user may act on.
///
/// Outside the all-branches case this returns the user's assignment as
/// stored, without intersecting it with `all_branch_ids`. A stale id in the
/// assignment is passed through.
pub fn accessible_branch_ids(user: &User, all_branch_ids: &[Uuid]) -> Vec<Uuid> {
    if has_all_branches_sentinel(user) {
        all_branch_ids.to_vec()
    } else {
        user.assigned_branch_ids.clone()
    }
}

/// An empty assignment means "all branches" and is only meaningful for a
/// super admin, so every other role needs at least one branch.
pub fn validate_branch_assignment(role: Role, branch_ids: &[Uuid]) -> Result<(), String> {
    if branch_ids.is_empty() && role != Role::SuperAdmin {
        return Err(format!(
            "A {role} must be assigned to at least one branch"
        ));
    }
    Ok(())
}
