use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Branch;

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    organization_id: Uuid,
    name: &str,
    slug: &str,
    address: Option<&str>,
    is_main: bool,
) -> Result<Branch, sqlx::Error> {
    sqlx::query_as::<_, Branch>(
        "INSERT INTO branches (organization_id, name, slug, address, is_main)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(organization_id)
    .bind(name)
    .bind(slug)
    .bind(address)
    .bind(is_main)
    .fetch_one(executor)
    .await
}

pub async fn list_by_organization(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Vec<Branch>, sqlx::Error> {
    sqlx::query_as::<_, Branch>(
        "SELECT * FROM branches WHERE organization_id = $1 ORDER BY is_main DESC, name",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await
}

/// Ids of every branch in the organization, for branch-scoping decisions.
pub async fn list_ids(pool: &PgPool, organization_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM branches WHERE organization_id = $1")
        .bind(organization_id)
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(
    pool: &PgPool,
    id: Uuid,
    organization_id: Uuid,
) -> Result<Option<Branch>, sqlx::Error> {
    sqlx::query_as::<_, Branch>(
        "SELECT * FROM branches WHERE id = $1 AND organization_id = $2",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await
}
