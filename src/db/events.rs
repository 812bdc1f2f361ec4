use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Event;

pub struct NewEvent<'a> {
    pub organization_id: Uuid,
    pub branch_id: Uuid,
    pub title: &'a str,
    pub event_type: &'a str,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub location_venue: Option<&'a str>,
    pub capacity: Option<i32>,
    pub created_by: Option<Uuid>,
}

pub async fn create(pool: &PgPool, new: &NewEvent<'_>) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "INSERT INTO events (organization_id, branch_id, title, event_type, start_date, end_date,
                             location_venue, capacity, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(new.organization_id)
    .bind(new.branch_id)
    .bind(new.title)
    .bind(new.event_type)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.location_venue)
    .bind(new.capacity)
    .bind(new.created_by)
    .fetch_one(pool)
    .await
}

pub async fn list_by_branch(pool: &PgPool, branch_id: Uuid) -> Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE branch_id = $1 ORDER BY start_date",
    )
    .bind(branch_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(
    pool: &PgPool,
    id: Uuid,
    organization_id: Uuid,
) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE id = $1 AND organization_id = $2",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await
}

