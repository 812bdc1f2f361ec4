use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;

/// Record a mutation in the audit log. Failures are logged and swallowed so
/// an audit outage never fails the request that triggered it.
pub async fn log_event(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Option<Uuid>,
    action: &str,
    resource_type: &str,
    resource_id: Option<Uuid>,
    details: Option<serde_json::Value>,
) {
    if let Err(e) = crate::db::audit::log_event(
        pool,
        organization_id,
        user_id,
        action,
        resource_type,
        resource_id,
        details,
    )
    .await
    {
        tracing::error!("Failed to log audit event {action}: {e}");
    }
}

/// Shorthand for the common case of an authenticated actor.
pub async fn log_by(
    pool: &PgPool,
    actor: &AuthUser,
    action: &str,
    resource_type: &str,
    resource_id: Option<Uuid>,
    details: Option<serde_json::Value>,
) {
    log_event(
        pool,
        actor.organization_id(),
        Some(actor.user_id()),
        action,
        resource_type,
        resource_id,
        details,
    )
    .await;
}
