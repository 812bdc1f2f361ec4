use axum::Json;
use axum::extract::State;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{self, Role, UserStatus, role_permissions};
use crate::auth::extractor::AuthUser;
use crate::auth::jwt::{Claims, encode_token};
use crate::auth::password;
use crate::db;
use crate::db::users::NewUser;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::User;
use crate::routes::{slugify, validate_slug};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub organization_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: User,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: User,
    pub accessible_branch_ids: Vec<Uuid>,
}

fn auth_cookie(access_token: &str) -> CookieJar {
    let access = Cookie::build(("access_token", access_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build();

    CookieJar::new().add(access)
}

fn issue_token(state: &SharedState, user: &User) -> Result<String, AppError> {
    let claims = Claims::new(user.id, user.organization_id);
    encode_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)
}

/// Bootstrap the first account: a new organization, its main campus, and a
/// super admin who may act on every branch.
pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    if req.email.trim().is_empty() || req.name.trim().is_empty() || req.organization_name.trim().is_empty() {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    }
    password::validate(&req.password).map_err(AppError::BadRequest)?;
    let organization_slug = slugify(&req.organization_name);
    validate_slug(&organization_slug)?;

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;

    // Advisory lock prevents concurrent bootstrap registrations
    let mut tx = state.pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(1)")
        .execute(&mut *tx)
        .await?;

    let count = db::users::count_all(&mut *tx).await?;
    if count > 0 {
        return Err(AppError::Forbidden(
            "Registration is closed. Ask an administrator for an account.".to_string(),
        ));
    }

    let organization =
        db::organizations::create(&mut *tx, req.organization_name.trim(), &organization_slug).await?;
    let main_campus = db::branches::create(
        &mut *tx,
        organization.id,
        "Main Campus",
        "main",
        None,
        true,
    )
    .await?;

    let permissions = role_permissions(Role::SuperAdmin);
    let user = db::users::create(
        &mut *tx,
        &NewUser {
            organization_id: organization.id,
            email: req.email.trim(),
            password_hash: &pw_hash,
            name: req.name.trim(),
            role: Role::SuperAdmin,
            permissions: &permissions,
            assigned_branch_ids: &[],
            primary_branch_id: Some(main_campus.id),
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!("Bootstrapped organization {} ({})", organization.name, organization.id);

    let access_token = issue_token(&state, &user)?;

    audit::log_event(
        &state.pool,
        organization.id,
        Some(user.id),
        "user.registered",
        "user",
        Some(user.id),
        None,
    )
    .await;

    Ok((auth_cookie(&access_token), Json(AuthResponse { access_token, user })))
}

pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    if state.login_limiter.check(&req.email).is_err() {
        return Err(AppError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let user = db::users::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let valid = password::verify(&req.password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        state.login_limiter.record_failure(&req.email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }
    state.login_limiter.clear(&req.email);

    if user.status != UserStatus::Active {
        return Err(AppError::Forbidden(format!(
            "Account is {}",
            user.status.as_str()
        )));
    }

    let access_token = issue_token(&state, &user)?;
    db::users::touch_last_login(&state.pool, user.id).await?;

    audit::log_event(
        &state.pool,
        user.organization_id,
        Some(user.id),
        "user.login",
        "user",
        Some(user.id),
        None,
    )
    .await;

    Ok((auth_cookie(&access_token), Json(AuthResponse { access_token, user })))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    (
        jar.remove(Cookie::build("access_token").path("/")),
        Json(serde_json::json!({ "message": "Logged out" })),
    )
}

pub async fn me(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<MeResponse>, AppError> {
    let all_branch_ids = db::branches::list_ids(&state.pool, auth.organization_id()).await?;
    let accessible_branch_ids = access::accessible_branch_ids(&auth.user, &all_branch_ids);

    Ok(Json(MeResponse {
        user: auth.user,
        accessible_branch_ids,
    }))
}
