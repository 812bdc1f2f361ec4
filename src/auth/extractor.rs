use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::access::{self, Permission, UserStatus};
use crate::auth::jwt;
use crate::db;
use crate::error::AppError;
use crate::models::User;
use crate::state::SharedState;

/// The authenticated caller, loaded fresh from storage on every request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn organization_id(&self) -> Uuid {
        self.user.organization_id
    }

    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if access::has_permission(&self.user, permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Missing permission: {permission}"
            )))
        }
    }

    pub fn require_any(&self, permissions: &[Permission]) -> Result<(), AppError> {
        if access::has_any_permission(&self.user, permissions) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Insufficient permissions".to_string()))
        }
    }

    pub fn require_branch(&self, branch_id: Uuid) -> Result<(), AppError> {
        if access::can_access_branch(&self.user, branch_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "No access to this branch".to_string(),
            ))
        }
    }
}

fn bearer_or_cookie(parts: &Parts) -> Result<Option<String>, AppError> {
    if let Some(auth_header) = parts.headers.get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(Some(token.to_string()));
        }
    }

    let jar = CookieJar::from_headers(&parts.headers);
    Ok(jar.get("access_token").map(|c| c.value().to_string()))
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_or_cookie(parts)?
            .ok_or_else(|| AppError::Unauthorized("Missing authentication token".to_string()))?;

        let claims = jwt::decode_token(&token, &state.config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        let user = db::users::find_by_id(&state.pool, claims.sub)
            .await?
            .filter(|u| u.organization_id == claims.oid)
            .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))?;

        if user.status != UserStatus::Active {
            return Err(AppError::Forbidden(format!(
                "Account is {}",
                user.status.as_str()
            )));
        }

        Ok(AuthUser { user })
    }
}
