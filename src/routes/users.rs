use std::collections::BTreeSet;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::access::{self, Permission, Role, UserStatus, role_permissions};
use crate::auth::extractor::AuthUser;
use crate::auth::password;
use crate::db;
use crate::db::users::NewUser;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::User;
use crate::routes::unique_violation;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub assigned_branch_ids: Vec<Uuid>,
    pub primary_branch_id: Option<Uuid>,
    /// Explicit grant; the role's defaults are used when omitted.
    pub permissions: Option<BTreeSet<Permission>>,
}

#[derive(Deserialize)]
pub struct UpdateRole {
    pub role: Role,
}

#[derive(Deserialize)]
pub struct UpdatePermissions {
    pub permissions: BTreeSet<Permission>,
}

#[derive(Deserialize)]
pub struct UpdateBranches {
    pub assigned_branch_ids: Vec<Uuid>,
    pub primary_branch_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateStatus {
    pub status: UserStatus,
}

fn ensure_can_assign_role(auth: &AuthUser, role: Role) -> Result<(), AppError> {
    if role == Role::SuperAdmin && auth.user.role != Role::SuperAdmin {
        return Err(AppError::Forbidden(
            "Only a super admin can grant the super admin role".to_string(),
        ));
    }
    Ok(())
}

/// Nobody can hand out a permission they do not hold themselves.
fn ensure_can_grant(auth: &AuthUser, permissions: &BTreeSet<Permission>) -> Result<(), AppError> {
    match permissions.difference(&auth.user.permissions).next() {
        Some(missing) => Err(AppError::Forbidden(format!(
            "Cannot grant a permission you do not hold: {missing}"
        ))),
        None => Ok(()),
    }
}

/// The caller must reach every branch the target reaches.
fn ensure_can_manage(auth: &AuthUser, target: &User) -> Result<(), AppError> {
    if target.role == Role::SuperAdmin && auth.user.role != Role::SuperAdmin {
        return Err(AppError::Forbidden("Cannot manage a super admin".to_string()));
    }
    if access::has_all_branches_sentinel(target) && !access::has_all_branches_sentinel(&auth.user) {
        return Err(AppError::Forbidden("Cannot manage this user".to_string()));
    }
    for branch_id in &target.assigned_branch_ids {
        auth.require_branch(*branch_id)?;
    }
    Ok(())
}

async fn check_assignment(
    state: &SharedState,
    auth: &AuthUser,
    role: Role,
    assigned: &[Uuid],
    primary: Option<Uuid>,
) -> Result<(), AppError> {
    access::validate_branch_assignment(role, assigned).map_err(AppError::BadRequest)?;

    let org_branches = db::branches::list_ids(&state.pool, auth.organization_id()).await?;
    for branch_id in assigned {
        if !org_branches.contains(branch_id) {
            return Err(AppError::BadRequest(format!("Unknown branch: {branch_id}")));
        }
        auth.require_branch(*branch_id)?;
    }

    if let Some(primary) = primary {
        let valid = if assigned.is_empty() {
            org_branches.contains(&primary)
        } else {
            assigned.contains(&primary)
        };
        if !valid {
            return Err(AppError::BadRequest(
                "Primary branch must be one of the assigned branches".to_string(),
            ));
        }
    }
    Ok(())
}

async fn load_target(state: &SharedState, auth: &AuthUser, id: Uuid) -> Result<User, AppError> {
    db::users::find_in_organization(&state.pool, id, auth.organization_id())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<User>>, AppError> {
    auth.require(Permission::UsersView)?;
    let users = db::users::list_by_organization(&state.pool, auth.organization_id()).await?;
    Ok(Json(users))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    auth.require(Permission::UsersView)?;
    Ok(Json(load_target(&state, &auth, id).await?))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<CreateUser>,
) -> Result<Json<User>, AppError> {
    auth.require(Permission::UsersManage)?;

    if req.email.trim().is_empty() || req.name.trim().is_empty() {
        return Err(AppError::BadRequest("Email and name are required".to_string()));
    }
    password::validate(&req.password).map_err(AppError::BadRequest)?;
    ensure_can_assign_role(&auth, req.role)?;
    check_assignment(&state, &auth, req.role, &req.assigned_branch_ids, req.primary_branch_id)
        .await?;

    let permissions = req.permissions.unwrap_or_else(|| role_permissions(req.role));
    ensure_can_grant(&auth, &permissions)?;

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;
    let primary_branch_id = req
        .primary_branch_id
        .or_else(|| req.assigned_branch_ids.first().copied());

    let user = db::users::create(
        &state.pool,
        &NewUser {
            organization_id: auth.organization_id(),
            email: req.email.trim(),
            password_hash: &pw_hash,
            name: req.name.trim(),
            role: req.role,
            permissions: &permissions,
            assigned_branch_ids: &req.assigned_branch_ids,
            primary_branch_id,
        },
    )
    .await
    .map_err(|e| unique_violation(e, "A user with this email already exists"))?;

    tracing::info!("Provisioned {} {} in organization {}", user.role, user.id, user.organization_id);

    audit::log_by(
        &state.pool,
        &auth,
        "user.created",
        "user",
        Some(user.id),
        Some(json!({ "role": user.role, "branches": user.assigned_branch_ids })),
    )
    .await;

    Ok(Json(user))
}

/// Change the role only. The stored permission set is left as is.
pub async fn update_role(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRole>,
) -> Result<Json<User>, AppError> {
    auth.require(Permission::UsersManage)?;

    let target = load_target(&state, &auth, id).await?;
    ensure_can_manage(&auth, &target)?;
    ensure_can_assign_role(&auth, req.role)?;
    access::validate_branch_assignment(req.role, &target.assigned_branch_ids)
        .map_err(AppError::BadRequest)?;

    let user = db::users::update_role(&state.pool, id, req.role).await?;

    audit::log_by(
        &state.pool,
        &auth,
        "user.role_updated",
        "user",
        Some(id),
        Some(json!({ "from": target.role, "to": req.role })),
    )
    .await;

    Ok(Json(user))
}

pub async fn update_permissions(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePermissions>,
) -> Result<Json<User>, AppError> {
    auth.require(Permission::UsersManage)?;

    let target = load_target(&state, &auth, id).await?;
    ensure_can_manage(&auth, &target)?;
    ensure_can_grant(&auth, &req.permissions)?;

    let user = db::users::update_permissions(&state.pool, id, &req.permissions).await?;

    audit::log_by(
        &state.pool,
        &auth,
        "user.permissions_updated",
        "user",
        Some(id),
        Some(json!({ "permissions": user.permissions })),
    )
    .await;

    Ok(Json(user))
}

pub async fn update_branches(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBranches>,
) -> Result<Json<User>, AppError> {
    auth.require(Permission::UsersManage)?;

    let target = load_target(&state, &auth, id).await?;
    ensure_can_manage(&auth, &target)?;
    check_assignment(&state, &auth, target.role, &req.assigned_branch_ids, req.primary_branch_id)
        .await?;

    let primary_branch_id = req
        .primary_branch_id
        .or_else(|| req.assigned_branch_ids.first().copied());
    let user =
        db::users::update_branches(&state.pool, id, &req.assigned_branch_ids, primary_branch_id)
            .await?;

    audit::log_by(
        &state.pool,
        &auth,
        "user.branches_updated",
        "user",
        Some(id),
        Some(json!({ "branches": user.assigned_branch_ids })),
    )
    .await;

    Ok(Json(user))
}

pub async fn update_status(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatus>,
) -> Result<Json<User>, AppError> {
    auth.require(Permission::UsersManage)?;

    if id == auth.user_id() {
        return Err(AppError::BadRequest("Cannot change your own status".to_string()));
    }

    let target = load_target(&state, &auth, id).await?;
    ensure_can_manage(&auth, &target)?;

    let user = db::users::update_status(&state.pool, id, req.status).await?;

    audit::log_by(
        &state.pool,
        &auth,
        "user.status_updated",
        "user",
        Some(id),
        Some(json!({ "status": req.status })),
    )
    .await;

    Ok(Json(user))
}
