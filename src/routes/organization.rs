use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use crate::access::{self, Permission};
use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::{AuditEvent, Branch, Organization};
use crate::routes::{slugify, unique_violation, validate_slug};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct UpdateOrganization {
    pub name: String,
    pub slug: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateBranch {
    pub name: String,
    pub slug: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn get_organization(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Organization>, AppError> {
    auth.require(Permission::SettingsView)?;

    let organization = db::organizations::find_by_id(&state.pool, auth.organization_id())
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;
    Ok(Json(organization))
}

pub async fn update_organization(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<UpdateOrganization>,
) -> Result<Json<Organization>, AppError> {
    auth.require(Permission::SettingsManage)?;

    let slug = req.slug.unwrap_or_else(|| slugify(&req.name));
    validate_slug(&slug)?;

    let organization =
        db::organizations::update(&state.pool, auth.organization_id(), &req.name, &slug)
            .await
            .map_err(|e| unique_violation(e, "An organization with this slug already exists"))?;

    audit::log_by(&state.pool, &auth, "organization.updated", "organization", Some(organization.id), None)
        .await;

    Ok(Json(organization))
}

/// Branches of the caller's organization that the caller may act on.
pub async fn list_branches(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Branch>>, AppError> {
    auth.require(Permission::BranchesView)?;

    let branches = db::branches::list_by_organization(&state.pool, auth.organization_id()).await?;
    let all_ids: Vec<_> = branches.iter().map(|b| b.id).collect();
    let accessible = access::accessible_branch_ids(&auth.user, &all_ids);

    Ok(Json(
        branches
            .into_iter()
            .filter(|b| accessible.contains(&b.id))
            .collect(),
    ))
}

pub async fn create_branch(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<CreateBranch>,
) -> Result<Json<Branch>, AppError> {
    auth.require(Permission::BranchesManage)?;

    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("Branch name is required".to_string()));
    }
    let slug = req.slug.unwrap_or_else(|| slugify(&req.name));
    validate_slug(&slug)?;

    let branch = db::branches::create(
        &state.pool,
        auth.organization_id(),
        req.name.trim(),
        &slug,
        req.address.as_deref(),
        false,
    )
    .await
    .map_err(|e| unique_violation(e, "A branch with this slug already exists"))?;

    audit::log_by(&state.pool, &auth, "branch.created", "branch", Some(branch.id), None).await;

    Ok(Json(branch))
}

pub async fn list_audit_events(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEvent>>, AppError> {
    auth.require(Permission::SettingsView)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);
    let events = db::audit::list(&state.pool, auth.organization_id(), limit, offset).await?;
    Ok(Json(events))
}
