use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::checkin::{CapacityStatus, CheckInError, CheckInMethod, SessionPhase};
use crate::client_ip;
use crate::error::AppError;
use crate::routes::check_in::{no_session, flush_unstored, validate_display_name};
use crate::state::SharedState;

/// What an attendee sees after following the check-in link.
#[derive(Serialize)]
pub struct PublicSessionView {
    pub event_id: Uuid,
    pub title: String,
    pub location_venue: Option<String>,
    pub phase: SessionPhase,
    pub expires_at: DateTime<Utc>,
    pub time_remaining: String,
    pub capacity: Option<CapacityStatus>,
}

#[derive(Deserialize)]
pub struct SelfCheckIn {
    pub display_name: String,
    pub member_id: Option<Uuid>,
}

pub async fn session(
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<PublicSessionView>, AppError> {
    let now = Utc::now();
    state
        .sessions
        .with_session(event_id, |s| PublicSessionView {
            event_id: s.event_id(),
            title: s.subject().title.clone(),
            location_venue: s.subject().location_venue.clone(),
            phase: s.phase_at(now),
            expires_at: s.expires_at(),
            time_remaining: s.time_remaining_at(now),
            capacity: s.capacity_status(),
        })
        .map(Json)
        .ok_or_else(no_session)
}

pub async fn check_in(
    State(state): State<SharedState>,
    Path(event_id): Path<Uuid>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<SelfCheckIn>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let ip = client_ip::resolve(&headers, addr.ip(), &state.config.trusted_proxies);
    if let Err(retry_after) =
        state
            .checkin_limiter
            .check(event_id, ip, state.config.checkin_rate_limit)
    {
        return Err(AppError::RateLimited(format!(
            "Too many check-ins from this address. Try again in {retry_after}s."
        )));
    }

    let display_name = validate_display_name(&req.display_name)?;

    let now = Utc::now();
    let (record, organization_id) = state
        .sessions
        .with_session(event_id, |s| {
            let record = s.record_check_in(req.member_id, display_name, CheckInMethod::Link, now)?;
            Ok::<_, CheckInError>((record, s.organization_id()))
        })
        .ok_or_else(no_session)??;

    flush_unstored(&state, event_id, organization_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "checked_in",
            "check_in_id": record.id(),
            "synced": record.synced(),
        })),
    ))
}
