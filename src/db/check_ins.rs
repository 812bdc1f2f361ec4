use sqlx::PgPool;
use uuid::Uuid;

use crate::checkin::CheckInRecord;
use crate::models::CheckIn;

/// Store synced records for an event. Records already stored are skipped,
/// so replaying a reconciliation batch is harmless. Returns how many rows
/// were new.
pub async fn persist(
    pool: &PgPool,
    event_id: Uuid,
    organization_id: Uuid,
    records: &[CheckInRecord],
) -> Result<u64, sqlx::Error> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for record in records {
        let result = sqlx::query(
            "INSERT INTO check_ins (id, event_id, organization_id, branch_id, member_id,
                                    display_name, method, checked_in_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(record.id())
        .bind(event_id)
        .bind(organization_id)
        .bind(record.branch_id())
        .bind(record.member_id())
        .bind(record.display_name())
        .bind(record.method().as_str())
        .bind(record.timestamp())
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn list_by_event(pool: &PgPool, event_id: Uuid) -> Result<Vec<CheckIn>, sqlx::Error> {
    sqlx::query_as::<_, CheckIn>(
        "SELECT * FROM check_ins WHERE event_id = $1 ORDER BY checked_in_at",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await
}

pub async fn count_by_event(pool: &PgPool, event_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM check_ins WHERE event_id = $1")
        .bind(event_id)
        .fetch_one(pool)
        .await
}
