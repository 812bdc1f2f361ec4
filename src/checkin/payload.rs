use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Event;

/// How long past its end (or start, if it has no end) an event's QR code
/// stays valid.
pub const GRACE_PERIOD_MINUTES: i64 = 60;

pub fn grace_period() -> Duration {
    Duration::minutes(GRACE_PERIOD_MINUTES)
}

/// Deep link used when a code cannot be scanned.
pub fn check_in_url(origin: &str, event_id: Uuid) -> String {
    format!("{}/events/check-in/{event_id}", origin.trim_end_matches('/'))
}

/// The event fields a check-in window needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInSubject {
    pub event_id: Uuid,
    pub title: String,
    pub event_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub location_venue: Option<String>,
    pub capacity: Option<u32>,
}

impl CheckInSubject {
    pub fn end_or_start(&self) -> DateTime<Utc> {
        self.end_date.unwrap_or(self.start_date)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.end_or_start() + grace_period()
    }
}

impl From<&Event> for CheckInSubject {
    fn from(event: &Event) -> Self {
        CheckInSubject {
            event_id: event.id,
            title: event.title.clone(),
            event_type: event.event_type.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
            location_venue: event.location_venue.clone(),
            capacity: event.capacity.and_then(|c| u32::try_from(c).ok()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadKind {
    #[serde(rename = "event-checkin")]
    EventCheckin,
}

/// The JSON document encoded into a check-in QR code.
///
/// Field names and the grace-period rule are read by scanners, so this shape
/// must stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    #[serde(rename = "type")]
    pub kind: PayloadKind,
    pub event_id: Uuid,
    pub event_title: String,
    pub event_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub branch_id: Uuid,
    pub organization_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    pub expires_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub check_in_url: String,
}

impl QrPayload {
    pub fn build(
        subject: &CheckInSubject,
        branch_id: Uuid,
        organization_id: Uuid,
        origin: &str,
        now: DateTime<Utc>,
    ) -> Self {
        QrPayload {
            kind: PayloadKind::EventCheckin,
            event_id: subject.event_id,
            event_title: subject.title.clone(),
            event_type: subject.event_type.clone(),
            start_date: subject.start_date,
            end_date: subject.end_or_start(),
            branch_id,
            organization_id,
            location_venue: subject.location_venue.clone(),
            capacity: subject.capacity,
            expires_at: subject.expires_at(),
            timestamp: now,
            check_in_url: check_in_url(origin, subject.event_id),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
