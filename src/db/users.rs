use std::collections::BTreeSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::access::{Permission, Role, UserStatus};
use crate::models::{User, UserRow};
use crate::models::user::permission_tokens;

pub struct NewUser<'a> {
    pub organization_id: Uuid,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
    pub role: Role,
    pub permissions: &'a BTreeSet<Permission>,
    pub assigned_branch_ids: &'a [Uuid],
    pub primary_branch_id: Option<Uuid>,
}

fn decode(row: UserRow) -> Result<User, sqlx::Error> {
    User::try_from(row).map_err(|e| sqlx::Error::Decode(e.into()))
}

fn decode_all(rows: Vec<UserRow>) -> Result<Vec<User>, sqlx::Error> {
    rows.into_iter().map(decode).collect()
}

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    new: &NewUser<'_>,
) -> Result<User, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (organization_id, email, password_hash, name, role, permissions,
                            assigned_branch_ids, primary_branch_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(new.organization_id)
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.name)
    .bind(new.role.as_str())
    .bind(permission_tokens(new.permissions))
    .bind(new.assigned_branch_ids)
    .bind(new.primary_branch_id)
    .fetch_one(executor)
    .await?;
    decode(row)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE lower(email) = lower($1)")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .map(decode)
        .transpose()
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(decode)
        .transpose()
}

/// Lookup restricted to one organization, for management routes.
pub async fn find_in_organization(
    pool: &PgPool,
    id: Uuid,
    organization_id: Uuid,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 AND organization_id = $2")
        .bind(id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?
        .map(decode)
        .transpose()
}

pub async fn count_all<'e, E: sqlx::PgExecutor<'e>>(executor: E) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(executor)
        .await?;
    Ok(row.0)
}

pub async fn list_by_organization(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Vec<User>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users WHERE organization_id = $1 ORDER BY name",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;
    decode_all(rows)
}

/// Changes the role only. Stored permissions are left as they are.
pub async fn update_role(pool: &PgPool, id: Uuid, role: Role) -> Result<User, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;
    decode(row)
}

pub async fn update_permissions(
    pool: &PgPool,
    id: Uuid,
    permissions: &BTreeSet<Permission>,
) -> Result<User, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET permissions = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(permission_tokens(permissions))
    .fetch_one(pool)
    .await?;
    decode(row)
}

pub async fn update_branches(
    pool: &PgPool,
    id: Uuid,
    assigned_branch_ids: &[Uuid],
    primary_branch_id: Option<Uuid>,
) -> Result<User, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET assigned_branch_ids = $2, primary_branch_id = $3, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(assigned_branch_ids)
    .bind(primary_branch_id)
    .fetch_one(pool)
    .await?;
    decode(row)
}

pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: UserStatus,
) -> Result<User, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_one(pool)
    .await?;
    decode(row)
}

pub async fn touch_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
