use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    // Null for social-only accounts
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub provider: AuthProvider,
    pub is_verified: bool,
    pub is_deleted: bool,
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Admin,
    SuperAdmin,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::User
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "PascalCase")]
#[serde(rename_all = "PascalCase")]
pub enum UserStatus {
    Active,
    Inactive,
    Banned,
}

impl Default for UserStatus {
    fn default() -> Self {
        Self::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
    Apple,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Google => "google",
            Self::Apple => "apple",
        }
    }
}

/// Trimmed projection returned from auth flows and user listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            is_verified: user.is_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Minimal projection resolved by the authorization middleware.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub is_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&UserRole::SuperAdmin).unwrap(),
            "\"SUPER_ADMIN\""
        );
        assert_eq!(serde_json::to_string(&UserRole::User).unwrap(), "\"USER\"");
    }

    #[test]
    fn test_provider_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AuthProvider::Google).unwrap(),
            "\"google\""
        );
        assert_eq!(AuthProvider::Apple.as_str(), "apple");
    }

    #[test]
    fn test_user_summary_drops_password() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password: Some("$2b$12$hash".to_string()),
            name: "Alice".to_string(),
            role: UserRole::User,
            status: UserStatus::Active,
            provider: AuthProvider::Local,
            is_verified: true,
            is_deleted: false,
            profile_pic: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(UserSummary::from(&user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["email"], "a@x.com");
    }
}
