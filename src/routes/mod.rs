pub mod auth;
pub mod check_in;
pub mod events;
pub mod organization;
pub mod public;
pub mod users;

use axum::Router;
use axum::routing::{get, post, put};

use crate::error::AppError;
use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/me", get(auth::me))
        // Organization
        .route(
            "/api/v1/organization",
            get(organization::get_organization).put(organization::update_organization),
        )
        .route(
            "/api/v1/branches",
            get(organization::list_branches).post(organization::create_branch),
        )
        .route("/api/v1/audit-events", get(organization::list_audit_events))
        // Users
        .route("/api/v1/users", get(users::list).post(users::create))
        .route("/api/v1/users/{id}", get(users::get))
        .route("/api/v1/users/{id}/role", put(users::update_role))
        .route("/api/v1/users/{id}/permissions", put(users::update_permissions))
        .route("/api/v1/users/{id}/branches", put(users::update_branches))
        .route("/api/v1/users/{id}/status", put(users::update_status))
        // Events
        .route(
            "/api/v1/branches/{branch_id}/events",
            get(events::list_by_branch).post(events::create),
        )
        .route("/api/v1/events/{id}", get(events::get))
        // Check-in
        .route(
            "/api/v1/events/{id}/check-in/session",
            post(check_in::open_session)
                .get(check_in::get_session)
                .delete(check_in::close_session),
        )
        .route(
            "/api/v1/events/{id}/check-in/session/refresh",
            post(check_in::refresh_session),
        )
        .route(
            "/api/v1/events/{id}/check-in/connectivity",
            put(check_in::set_connectivity),
        )
        .route(
            "/api/v1/events/{id}/check-ins",
            get(check_in::list_records).post(check_in::record),
        )
}

/// Unauthenticated routes reached through the QR code.
pub fn public_routes() -> Router<SharedState> {
    Router::new().route(
        "/events/check-in/{event_id}",
        get(public::session).post(public::check_in),
    )
}

pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    if slug.is_empty() || slug.len() > 100 {
        return Err(AppError::BadRequest(
            "Slug must be between 1 and 100 characters".to_string(),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(AppError::BadRequest(
            "Slug must contain only lowercase letters, numbers, and hyphens".to_string(),
        ));
    }
    Ok(())
}

/// Map a unique-constraint violation to a 409 with `msg`.
pub fn unique_violation(e: sqlx::Error, msg: &str) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(msg.to_string())
        }
        _ => AppError::Database(e),
    }
}
