use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::access::Permission;
use crate::auth::extractor::AuthUser;
use crate::checkin::{
    CapacityStatus, CheckInMethod, CheckInRecord, CheckInSession, CheckInSubject, QrPayload,
    SessionPhase,
};
use crate::db;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::CheckIn;
use crate::routes::events::load_scoped;
use crate::state::SharedState;

pub const MAX_DISPLAY_NAME_LEN: usize = 200;

#[derive(Serialize)]
pub struct SessionView {
    pub event_id: Uuid,
    pub branch_id: Uuid,
    pub phase: SessionPhase,
    pub expires_at: DateTime<Utc>,
    pub time_remaining: String,
    pub online: bool,
    pub offline_queue: usize,
    pub unstored: usize,
    pub checked_in: usize,
    pub capacity: Option<CapacityStatus>,
    pub payload: Option<QrPayload>,
    pub qr_svg: Option<String>,
}

impl SessionView {
    pub fn of(session: &CheckInSession, now: DateTime<Utc>) -> Self {
        SessionView {
            event_id: session.event_id(),
            branch_id: session.branch_id(),
            phase: session.phase_at(now),
            expires_at: session.expires_at(),
            time_remaining: session.time_remaining_at(now),
            online: session.is_online(),
            offline_queue: session.offline_queue_len(),
            unstored: session.unstored_len(),
            checked_in: session.records().len(),
            capacity: session.capacity_status(),
            payload: session.payload().cloned(),
            qr_svg: session.qr_image().map(|image| image.svg.clone()),
        }
    }
}

#[derive(Serialize)]
pub struct SessionStatus {
    #[serde(flatten)]
    pub session: SessionView,
    /// Rows already in storage for this event, across all sessions.
    pub persisted: i64,
}

#[derive(Deserialize)]
pub struct RecordCheckIn {
    pub member_id: Option<Uuid>,
    pub display_name: String,
    pub method: CheckInMethod,
}

#[derive(Serialize)]
pub struct RecordResponse {
    pub record: CheckInRecord,
    pub capacity: Option<CapacityStatus>,
}

#[derive(Deserialize)]
pub struct Connectivity {
    pub online: bool,
}

pub fn no_session() -> AppError {
    AppError::NotFound("No check-in session is open for this event".to_string())
}

pub fn validate_display_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("display_name is required".to_string()));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "display_name must be at most {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

/// Write every synced record the session still holds unstored, then
/// confirm them. A failed write leaves them in place for the next call.
/// Storage ignores ids it has already seen.
pub async fn flush_unstored(
    state: &SharedState,
    event_id: Uuid,
    organization_id: Uuid,
) -> Result<u64, AppError> {
    let batch = state
        .sessions
        .with_session(event_id, |s| s.unstored())
        .ok_or_else(no_session)?;
    if batch.is_empty() {
        return Ok(0);
    }

    let inserted =
        match db::check_ins::persist(&state.pool, event_id, organization_id, &batch).await {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::warn!(
                    "Storing {} check-ins for event {event_id} failed, will retry: {e}",
                    batch.len()
                );
                return Err(e.into());
            }
        };

    let ids: Vec<Uuid> = batch.iter().map(|r| r.id()).collect();
    state.sessions.with_session(event_id, |s| s.mark_stored(&ids));
    Ok(inserted)
}

pub async fn open_session(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    auth.require(Permission::CheckinManage)?;
    let event = load_scoped(&state, &auth, event_id).await?;

    if state.sessions.contains(event.id) {
        return Err(AppError::Conflict(
            "A check-in session is already open for this event".to_string(),
        ));
    }

    let now = Utc::now();
    let mut session = CheckInSession::open(
        CheckInSubject::from(&event),
        event.branch_id,
        event.organization_id,
        state.config.base_url.clone(),
    );
    session.materialize(state.qr_encoder.as_ref(), now)?;
    let view = SessionView::of(&session, now);

    if !state.sessions.open(session) {
        return Err(AppError::Conflict(
            "A check-in session is already open for this event".to_string(),
        ));
    }

    audit::log_by(&state.pool, &auth, "checkin.session_opened", "event", Some(event.id), None)
        .await;

    Ok(Json(view))
}

pub async fn get_session(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<SessionStatus>, AppError> {
    auth.require(Permission::CheckinView)?;
    let event = load_scoped(&state, &auth, event_id).await?;

    let now = Utc::now();
    let session = state
        .sessions
        .with_session(event.id, |s| SessionView::of(s, now))
        .ok_or_else(no_session)?;
    let persisted = db::check_ins::count_by_event(&state.pool, event.id).await?;

    Ok(Json(SessionStatus { session, persisted }))
}

/// Re-issue the QR code with a fresh timestamp. Recorded check-ins are kept.
pub async fn refresh_session(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    auth.require(Permission::CheckinManage)?;
    let event = load_scoped(&state, &auth, event_id).await?;

    let now = Utc::now();
    let view = state
        .sessions
        .with_session(event.id, |s| {
            s.materialize(state.qr_encoder.as_ref(), now)?;
            Ok::<_, crate::checkin::CheckInError>(SessionView::of(s, now))
        })
        .ok_or_else(no_session)??;

    Ok(Json(view))
}

pub async fn close_session(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require(Permission::CheckinManage)?;
    let event = load_scoped(&state, &auth, event_id).await?;

    flush_unstored(&state, event.id, event.organization_id).await?;
    let session = state.sessions.close(event.id).ok_or_else(no_session)?;
    let unsynced = session.offline_queue_len() + session.unstored_len();
    if unsynced > 0 {
        tracing::warn!(
            "Discarding {unsynced} unsynced check-ins with the session for event {}",
            event.id
        );
    }

    audit::log_by(
        &state.pool,
        &auth,
        "checkin.session_closed",
        "event",
        Some(event.id),
        Some(json!({ "checked_in": session.records().len(), "unsynced": unsynced })),
    )
    .await;

    Ok(Json(json!({
        "checked_in": session.records().len(),
        "unsynced_discarded": unsynced,
    })))
}

pub async fn set_connectivity(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<Connectivity>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require(Permission::CheckinManage)?;
    let event = load_scoped(&state, &auth, event_id).await?;

    let reconciled = state
        .sessions
        .with_session(event.id, |s| s.set_online(req.online))
        .ok_or_else(no_session)?;

    let persisted = flush_unstored(&state, event.id, event.organization_id).await?;

    Ok(Json(json!({
        "online": req.online,
        "synced": reconciled.len(),
        "persisted": persisted,
    })))
}

pub async fn record(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<RecordCheckIn>,
) -> Result<Json<RecordResponse>, AppError> {
    auth.require(Permission::CheckinManage)?;
    if req.method == CheckInMethod::Link {
        return Err(AppError::BadRequest(
            "Link check-ins go through the public check-in URL".to_string(),
        ));
    }
    let display_name = validate_display_name(&req.display_name)?;
    let event = load_scoped(&state, &auth, event_id).await?;

    let now = Utc::now();
    let (record, capacity) = state
        .sessions
        .with_session(event.id, |s| {
            let record = s.record_check_in(req.member_id, display_name, req.method, now)?;
            Ok::<_, crate::checkin::CheckInError>((record, s.capacity_status()))
        })
        .ok_or_else(no_session)??;

    flush_unstored(&state, event.id, event.organization_id).await?;

    Ok(Json(RecordResponse { record, capacity }))
}

pub async fn list_records(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<CheckIn>>, AppError> {
    auth.require(Permission::CheckinView)?;
    let event = load_scoped(&state, &auth, event_id).await?;

    let records = db::check_ins::list_by_event(&state.pool, event.id).await?;
    Ok(Json(records))
}
