use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Permission;
use super::Permission::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    BranchAdmin,
    Staff,
    Volunteer,
    Member,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::BranchAdmin,
        Role::Staff,
        Role::Volunteer,
        Role::Member,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::BranchAdmin => "branch_admin",
            Role::Staff => "staff",
            Role::Volunteer => "volunteer",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Unknown role: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(format!("Unknown user status: {other}")),
        }
    }
}

const BRANCH_ADMIN: &[Permission] = &[
    MembersView,
    MembersCreate,
    MembersEdit,
    MembersDelete,
    EventsView,
    EventsCreate,
    EventsEdit,
    EventsDelete,
    ServicesView,
    ServicesCreate,
    ServicesEdit,
    ServicesDelete,
    CheckinView,
    CheckinManage,
    GivingView,
    GivingRecord,
    MessagesView,
    MessagesSend,
    ReportsView,
    BranchesView,
    UsersView,
    UsersManage,
    SettingsView,
];

const STAFF: &[Permission] = &[
    MembersView,
    MembersCreate,
    MembersEdit,
    EventsView,
    EventsCreate,
    EventsEdit,
    ServicesView,
    ServicesCreate,
    ServicesEdit,
    CheckinView,
    CheckinManage,
    GivingView,
    MessagesView,
    MessagesSend,
    ReportsView,
    BranchesView,
];

const VOLUNTEER: &[Permission] = &[
    MembersView,
    EventsView,
    ServicesView,
    CheckinView,
    CheckinManage,
    MessagesView,
];

const MEMBER: &[Permission] = &[EventsView, ServicesView, MessagesView];

/// Default permission set for a newly provisioned user with `role`.
///
/// This is a seed table only. Authorization checks read the user's stored
/// permissions and never call back into this function, so a user whose
/// permissions were edited keeps them when their role later changes.
pub fn role_permissions(role: Role) -> BTreeSet<Permission> {
    let seed = match role {
        Role::SuperAdmin => Permission::ALL,
        Role::BranchAdmin => BRANCH_ADMIN,
        Role::Staff => STAFF,
        Role::Volunteer => VOLUNTEER,
        Role::Member => MEMBER,
    };
    seed.iter().copied().collect()
}
