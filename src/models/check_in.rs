use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A check-in record as persisted after it was synced.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: Uuid,
    pub event_id: Uuid,
    pub organization_id: Uuid,
    pub branch_id: Uuid,
    pub member_id: Option<Uuid>,
    pub display_name: String,
    pub method: String,
    pub checked_in_at: DateTime<Utc>,
    pub persisted_at: DateTime<Utc>,
}
