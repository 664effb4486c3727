use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::{AuthUser, UserRole, UserStatus},
    services::token::TokenService,
    AppState,
};

/// Declarative per-route capability requirement. An empty set admits any
/// authenticated user.
#[derive(Debug, Clone, Copy)]
pub struct RoleSet(&'static [UserRole]);

pub const ANY_ROLE: RoleSet = RoleSet(&[]);
pub const ADMINS: RoleSet = RoleSet(&[UserRole::Admin, UserRole::SuperAdmin]);
pub const SUPER_ADMIN_ONLY: RoleSet = RoleSet(&[UserRole::SuperAdmin]);

impl RoleSet {
    pub fn permits(&self, role: UserRole) -> bool {
        self.0.is_empty() || self.0.contains(&role)
    }
}

/// The authorization gate: bearer token to live, non-banned user to role
/// membership, re-verified from scratch on every protected request.
pub async fn auth_middleware(
    State((state, roles)): State<(AppState, RoleSet)>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;

    let claims = TokenService::new(state.config.jwt.clone()).verify_access_token(token)?;

    let user: Option<AuthUser> = sqlx::query_as(
        "SELECT id, email, role, status, is_deleted FROM users WHERE id = $1",
    )
    .bind(claims.id)
    .fetch_optional(&state.db)
    .await?;

    let user = user.ok_or(AppError::UserNotFound)?;

    if user.status == UserStatus::Banned {
        return Err(AppError::AccountBanned);
    }
    if user.is_deleted {
        return Err(AppError::AccountDeleted);
    }

    if !roles.permits(user.role) {
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Only the Bearer scheme is accepted; a bare token is not.
fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_empty_role_set_permits_everyone() {
        assert!(ANY_ROLE.permits(UserRole::User));
        assert!(ANY_ROLE.permits(UserRole::Admin));
        assert!(ANY_ROLE.permits(UserRole::SuperAdmin));
    }

    #[test]
    fn test_admins_set_excludes_plain_users() {
        assert!(!ADMINS.permits(UserRole::User));
        assert!(ADMINS.permits(UserRole::Admin));
        assert!(ADMINS.permits(UserRole::SuperAdmin));
    }

    #[test]
    fn test_super_admin_set_excludes_admins() {
        assert!(!SUPER_ADMIN_ONLY.permits(UserRole::Admin));
        assert!(SUPER_ADMIN_ONLY.permits(UserRole::SuperAdmin));
    }

    #[test]
    fn test_bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, "abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Basic dXNlcjpwdw==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
