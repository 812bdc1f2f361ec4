use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::access::Permission;
use crate::auth::extractor::AuthUser;
use crate::db;
use crate::db::events::NewEvent;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::Event;
use crate::models::event::EVENT_TYPES;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct CreateEvent {
    pub title: String,
    pub event_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub location_venue: Option<String>,
    pub capacity: Option<i32>,
}

/// Services and general events are gated by different permission domains.
fn view_permission(event_type: &str) -> Permission {
    if event_type == "service" {
        Permission::ServicesView
    } else {
        Permission::EventsView
    }
}

fn create_permission(event_type: &str) -> Permission {
    if event_type == "service" {
        Permission::ServicesCreate
    } else {
        Permission::EventsCreate
    }
}

fn validate(req: &CreateEvent) -> Result<(), AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title is required".to_string()));
    }
    if !EVENT_TYPES.contains(&req.event_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "event_type must be one of: {}",
            EVENT_TYPES.join(", ")
        )));
    }
    if req.end_date.is_some_and(|end| end < req.start_date) {
        return Err(AppError::BadRequest(
            "end_date must not be before start_date".to_string(),
        ));
    }
    if req.capacity.is_some_and(|c| c < 0) {
        return Err(AppError::BadRequest("capacity must not be negative".to_string()));
    }
    Ok(())
}

/// Load an event of the caller's organization and check branch scope.
pub async fn load_scoped(
    state: &SharedState,
    auth: &AuthUser,
    event_id: Uuid,
) -> Result<Event, AppError> {
    let event = db::events::find_by_id(&state.pool, event_id, auth.organization_id())
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    auth.require_branch(event.branch_id)?;
    Ok(event)
}

pub async fn list_by_branch(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<Vec<Event>>, AppError> {
    auth.require_any(&[Permission::EventsView, Permission::ServicesView])?;
    auth.require_branch(branch_id)?;

    db::branches::find_by_id(&state.pool, branch_id, auth.organization_id())
        .await?
        .ok_or_else(|| AppError::NotFound("Branch not found".to_string()))?;

    let events = db::events::list_by_branch(&state.pool, branch_id)
        .await?
        .into_iter()
        .filter(|e| auth.require(view_permission(&e.event_type)).is_ok())
        .collect();
    Ok(Json(events))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(branch_id): Path<Uuid>,
    Json(req): Json<CreateEvent>,
) -> Result<Json<Event>, AppError> {
    validate(&req)?;
    auth.require(create_permission(&req.event_type))?;
    auth.require_branch(branch_id)?;

    db::branches::find_by_id(&state.pool, branch_id, auth.organization_id())
        .await?
        .ok_or_else(|| AppError::NotFound("Branch not found".to_string()))?;

    let event = db::events::create(
        &state.pool,
        &NewEvent {
            organization_id: auth.organization_id(),
            branch_id,
            title: req.title.trim(),
            event_type: &req.event_type,
            start_date: req.start_date,
            end_date: req.end_date,
            location_venue: req.location_venue.as_deref(),
            capacity: req.capacity,
            created_by: Some(auth.user_id()),
        },
    )
    .await?;

    audit::log_by(&state.pool, &auth, "event.created", "event", Some(event.id), None).await;

    Ok(Json(event))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Event>, AppError> {
    let event = load_scoped(&state, &auth, id).await?;
    auth.require(view_permission(&event.event_type))?;
    Ok(Json(event))
}
