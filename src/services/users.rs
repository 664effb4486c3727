use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{AuthUser, LoginActivity, UserRole, UserSummary},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_page: i64,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<UserSummary>,
    pub meta: ListMeta,
}

pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        page: i64,
        limit: i64,
        search_term: Option<&str>,
    ) -> AppResult<UserList> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page - 1) * limit;
        let search = search_term.unwrap_or("");

        let users: Vec<UserSummary> = sqlx::query_as(
            r#"
            SELECT id, email, name, role, is_verified, created_at, updated_at
            FROM users
            WHERE is_deleted = FALSE
              AND ($1 = '' OR name ILIKE '%' || $1 || '%' OR email ILIKE '%' || $1 || '%')
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users
            WHERE is_deleted = FALSE
              AND ($1 = '' OR name ILIKE '%' || $1 || '%' OR email ILIKE '%' || $1 || '%')
            "#,
        )
        .bind(search)
        .fetch_one(&self.db)
        .await?;

        Ok(UserList {
            users,
            meta: ListMeta {
                page,
                limit,
                total,
                total_page: (total + limit - 1) / limit,
            },
        })
    }

    pub async fn get(&self, user_id: Uuid) -> AppResult<UserSummary> {
        let user: Option<UserSummary> = sqlx::query_as(
            "SELECT id, email, name, role, is_verified, created_at, updated_at \
             FROM users WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        user.ok_or(AppError::UserNotFound)
    }

    /// Profile fields only; role and status have their own operations.
    pub async fn update(
        &self,
        actor: &AuthUser,
        user_id: Uuid,
        name: Option<&str>,
        profile_pic: Option<&str>,
    ) -> AppResult<UserSummary> {
        if actor.id != user_id && !is_admin(actor.role) {
            return Err(AppError::Forbidden);
        }

        if name.is_none() && profile_pic.is_none() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }

        let user: Option<UserSummary> = sqlx::query_as(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                profile_pic = COALESCE($2, profile_pic),
                updated_at = NOW()
            WHERE id = $3 AND is_deleted = FALSE
            RETURNING id, email, name, role, is_verified, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(profile_pic)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        user.ok_or(AppError::UserNotFound)
    }

    /// Admin removal is a soft delete: the row stays, the account goes dark.
    pub async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        let deleted: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET is_deleted = TRUE, status = 'Inactive', updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING id
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        deleted.map(|_| ()).ok_or(AppError::UserNotFound)
    }

    pub async fn update_role(&self, user_id: Uuid, role: UserRole) -> AppResult<UserSummary> {
        let user: Option<UserSummary> = sqlx::query_as(
            r#"
            UPDATE users
            SET role = $1, updated_at = NOW()
            WHERE id = $2 AND is_deleted = FALSE
            RETURNING id, email, name, role, is_verified, created_at, updated_at
            "#,
        )
        .bind(role)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        user.ok_or(AppError::UserNotFound)
    }

    /// Most recent login attempts for a user, newest first.
    pub async fn login_activities(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<LoginActivity>> {
        // 404 for unknown ids rather than an empty list
        self.get(user_id).await?;

        let activities = sqlx::query_as(
            "SELECT * FROM login_activities WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.db)
        .await?;

        Ok(activities)
    }
}

pub fn is_admin(role: UserRole) -> bool {
    matches!(role, UserRole::Admin | UserRole::SuperAdmin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_admin() {
        assert!(is_admin(UserRole::Admin));
        assert!(is_admin(UserRole::SuperAdmin));
        assert!(!is_admin(UserRole::User));
    }
}
