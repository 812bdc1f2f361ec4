use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payload::{CheckInSubject, QrPayload};
use super::qr::{QrEncoder, QrImage};
use super::CheckInError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckInMethod {
    Qr,
    Manual,
    Link,
}

impl CheckInMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckInMethod::Qr => "qr",
            CheckInMethod::Manual => "manual",
            CheckInMethod::Link => "link",
        }
    }
}

impl fmt::Display for CheckInMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckInMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qr" => Ok(CheckInMethod::Qr),
            "manual" => Ok(CheckInMethod::Manual),
            "link" => Ok(CheckInMethod::Link),
            other => Err(format!("Unknown check-in method: {other}")),
        }
    }
}

/// One attendee arrival. Only `synced` ever changes after creation, and only
/// from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInRecord {
    id: Uuid,
    member_id: Option<Uuid>,
    display_name: String,
    timestamp: DateTime<Utc>,
    method: CheckInMethod,
    synced: bool,
    branch_id: Uuid,
}

impl CheckInRecord {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn member_id(&self) -> Option<Uuid> {
        self.member_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn method(&self) -> CheckInMethod {
        self.method
    }

    pub fn synced(&self) -> bool {
        self.synced
    }

    pub fn branch_id(&self) -> Uuid {
        self.branch_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityStatus {
    pub percentage: f64,
    pub remaining: u32,
    pub is_full: bool,
    pub is_near_capacity: bool,
}

/// Near capacity starts at this percentage.
const NEAR_CAPACITY_PERCENT: f64 = 90.0;

pub fn capacity_status(checked_in: usize, capacity: u32) -> CapacityStatus {
    let count = u32::try_from(checked_in).unwrap_or(u32::MAX);
    let percentage = if capacity == 0 {
        100.0
    } else {
        f64::from(count) * 100.0 / f64::from(capacity)
    };

    CapacityStatus {
        percentage,
        remaining: capacity.saturating_sub(count),
        is_full: count >= capacity,
        is_near_capacity: percentage >= NEAR_CAPACITY_PERCENT,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Building,
    Active,
    Expired,
}

/// The check-in window for one event or service.
///
/// Expiry is advisory: late check-ins are still recorded. Callers that want
/// to refuse them can gate on [`CheckInSession::is_expired_at`].
#[derive(Debug)]
pub struct CheckInSession {
    subject: CheckInSubject,
    branch_id: Uuid,
    organization_id: Uuid,
    origin: String,
    payload: Option<QrPayload>,
    qr_image: Option<QrImage>,
    records: Vec<CheckInRecord>,
    offline_queue: Vec<Uuid>,
    /// Synced records whose storage write has not been confirmed yet.
    unstored: Vec<Uuid>,
    online: bool,
}

impl CheckInSession {
    pub fn open(
        subject: CheckInSubject,
        branch_id: Uuid,
        organization_id: Uuid,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            branch_id,
            organization_id,
            origin: origin.into(),
            payload: None,
            qr_image: None,
            records: Vec::new(),
            offline_queue: Vec::new(),
            unstored: Vec::new(),
            online: true,
        }
    }

    /// Build the QR payload and render it.
    ///
    /// On failure the session keeps whatever code it had before (none, for a
    /// fresh session), so the call can simply be repeated.
    pub fn materialize(
        &mut self,
        encoder: &dyn QrEncoder,
        now: DateTime<Utc>,
    ) -> Result<&QrPayload, CheckInError> {
        let payload = QrPayload::build(
            &self.subject,
            self.branch_id,
            self.organization_id,
            &self.origin,
            now,
        );
        let json = payload
            .to_json()
            .map_err(|e| CheckInError::Encoding(e.to_string()))?;
        let image = encoder.encode(&json)?;

        self.qr_image = Some(image);
        Ok(&*self.payload.insert(payload))
    }

    pub fn record_check_in(
        &mut self,
        member_id: Option<Uuid>,
        display_name: impl Into<String>,
        method: CheckInMethod,
        now: DateTime<Utc>,
    ) -> Result<CheckInRecord, CheckInError> {
        if self.payload.is_none() {
            return Err(CheckInError::NotMaterialized);
        }

        let record = CheckInRecord {
            id: Uuid::now_v7(),
            member_id,
            display_name: display_name.into(),
            timestamp: now,
            method,
            synced: self.online,
            branch_id: self.branch_id,
        };

        if self.online {
            self.unstored.push(record.id);
        } else {
            self.offline_queue.push(record.id);
        }
        self.records.push(record.clone());

        Ok(record)
    }

    /// `None` when the event has no capacity limit.
    pub fn capacity_status(&self) -> Option<CapacityStatus> {
        self.subject
            .capacity
            .map(|capacity| capacity_status(self.records.len(), capacity))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.subject.expires_at()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    pub fn phase_at(&self, now: DateTime<Utc>) -> SessionPhase {
        if self.payload.is_none() {
            SessionPhase::Building
        } else if self.is_expired_at(now) {
            SessionPhase::Expired
        } else {
            SessionPhase::Active
        }
    }

    pub fn time_remaining_at(&self, now: DateTime<Utc>) -> String {
        if self.is_expired_at(now) {
            return "Expired".to_string();
        }
        format_remaining(self.expires_at() - now)
    }

    /// Connectivity boundary event. Coming back online reconciles the offline
    /// queue and returns the records that still need to be persisted.
    pub fn set_online(&mut self, online: bool) -> Vec<CheckInRecord> {
        if self.online != online {
            tracing::info!(
                "Check-in session for event {} is now {}",
                self.subject.event_id,
                if online { "online" } else { "offline" }
            );
        }
        self.online = online;

        if online {
            self.sync_offline_queue()
        } else {
            Vec::new()
        }
    }

    /// Mark every queued record as synced and empty the queue.
    ///
    /// Synced records wait in [`CheckInSession::unstored`] until
    /// [`CheckInSession::mark_stored`] confirms the write, so a failed write
    /// can be retried. Storage must be idempotent on record id.
    pub fn sync_offline_queue(&mut self) -> Vec<CheckInRecord> {
        let queued: HashSet<Uuid> = self.offline_queue.drain(..).collect();
        if queued.is_empty() {
            return Vec::new();
        }

        let mut synced = Vec::with_capacity(queued.len());
        for record in self.records.iter_mut().filter(|r| queued.contains(&r.id)) {
            record.synced = true;
            self.unstored.push(record.id);
            synced.push(record.clone());
        }

        tracing::info!(
            "Synced {} offline check-ins for event {}",
            synced.len(),
            self.subject.event_id
        );
        synced
    }

    /// Synced records not yet confirmed in storage, oldest first.
    pub fn unstored(&self) -> Vec<CheckInRecord> {
        let pending: HashSet<Uuid> = self.unstored.iter().copied().collect();
        self.records
            .iter()
            .filter(|r| pending.contains(&r.id))
            .cloned()
            .collect()
    }

    /// Confirm that `ids` reached storage.
    pub fn mark_stored(&mut self, ids: &[Uuid]) {
        self.unstored.retain(|id| !ids.contains(id));
    }

    pub fn unstored_len(&self) -> usize {
        self.unstored.len()
    }

    pub fn subject(&self) -> &CheckInSubject {
        &self.subject
    }

    pub fn event_id(&self) -> Uuid {
        self.subject.event_id
    }

    pub fn branch_id(&self) -> Uuid {
        self.branch_id
    }

    pub fn organization_id(&self) -> Uuid {
        self.organization_id
    }

    pub fn payload(&self) -> Option<&QrPayload> {
        self.payload.as_ref()
    }

    pub fn qr_image(&self) -> Option<&QrImage> {
        self.qr_image.as_ref()
    }

    pub fn records(&self) -> &[CheckInRecord] {
        &self.records
    }

    pub fn offline_queue_len(&self) -> usize {
        self.offline_queue.len()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }
}

fn format_remaining(delta: TimeDelta) -> String {
    let days = delta.num_days();
    let hours = delta.num_hours() % 24;
    let minutes = delta.num_minutes() % 60;
    let seconds = delta.num_seconds() % 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m {seconds}s")
    }
}
