use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::access::{Permission, Role, UserStatus};

/// Row shape of the `users` table. Enum-like columns are stored as text and
/// decoded into [`User`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub assigned_branch_ids: Vec<Uuid>,
    pub primary_branch_id: Option<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
    pub assigned_branch_ids: Vec<Uuid>,
    pub primary_branch_id: Option<Uuid>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = String;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse()?;
        let status: UserStatus = row.status.parse()?;

        let permissions = row
            .permissions
            .iter()
            .filter_map(|token| match token.parse::<Permission>() {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("Dropping stored token for user {}: {e}", row.id);
                    None
                }
            })
            .collect();

        Ok(User {
            id: row.id,
            organization_id: row.organization_id,
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            role,
            permissions,
            assigned_branch_ids: row.assigned_branch_ids,
            primary_branch_id: row.primary_branch_id,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login_at: row.last_login_at,
        })
    }
}

/// Storage form of a permission set.
pub fn permission_tokens(permissions: &BTreeSet<Permission>) -> Vec<String> {
    permissions.iter().map(|p| p.as_str().to_string()).collect()
}
