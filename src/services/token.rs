use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::JwtConfig,
    error::AppResult,
    models::UserRole,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies the service's own bearer tokens. Access and refresh
/// tokens use distinct secrets so one can never stand in for the other.
#[derive(Clone)]
pub struct TokenService {
    config: JwtConfig,
}

impl TokenService {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn issue_access_token(&self, id: Uuid, email: &str, role: UserRole) -> AppResult<String> {
        self.issue(
            id,
            email,
            role,
            &self.config.access_secret,
            self.config.access_ttl.as_secs() as i64,
        )
    }

    pub fn issue_refresh_token(&self, id: Uuid, email: &str, role: UserRole) -> AppResult<String> {
        self.issue(
            id,
            email,
            role,
            &self.config.refresh_secret,
            self.config.refresh_ttl.as_secs() as i64,
        )
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Claims> {
        self.verify(token, &self.config.access_secret)
    }

    pub fn verify_refresh_token(&self, token: &str) -> AppResult<Claims> {
        self.verify(token, &self.config.refresh_secret)
    }

    fn issue(
        &self,
        id: Uuid,
        email: &str,
        role: UserRole,
        secret: &str,
        ttl_secs: i64,
    ) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        };

        let key = EncodingKey::from_secret(secret.as_bytes());
        Ok(encode(&Header::default(), &claims, &key)?)
    }

    fn verify(&self, token: &str, secret: &str) -> AppResult<Claims> {
        let key = DecodingKey::from_secret(secret.as_bytes());
        let validation = Validation::default();
        let token_data = decode::<Claims>(token, &key, &validation)?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn test_service() -> TokenService {
        TokenService::new(JwtConfig {
            access_secret: "test-access-secret".to_string(),
            access_ttl: StdDuration::from_secs(3600),
            refresh_secret: "test-refresh-secret".to_string(),
            refresh_ttl: StdDuration::from_secs(86400),
        })
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = test_service();
        let id = Uuid::new_v4();
        let token = service
            .issue_access_token(id, "a@x.com", UserRole::Admin)
            .unwrap();

        let claims = service.verify_access_token(&token).unwrap();
        assert_eq!(claims.id, id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, UserRole::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_token_not_accepted_as_access_token() {
        let service = test_service();
        let token = service
            .issue_refresh_token(Uuid::new_v4(), "a@x.com", UserRole::User)
            .unwrap();

        assert!(service.verify_access_token(&token).is_err());
        assert!(service.verify_refresh_token(&token).is_ok());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let service = test_service();
        let mut token = service
            .issue_access_token(Uuid::new_v4(), "a@x.com", UserRole::User)
            .unwrap();
        token.push('x');

        assert!(service.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = TokenService::new(JwtConfig {
            access_secret: "s".to_string(),
            access_ttl: StdDuration::from_secs(0),
            refresh_secret: "r".to_string(),
            refresh_ttl: StdDuration::from_secs(0),
        });
        // jsonwebtoken applies a default 60s leeway, so issue one well in the past
        let token = service
            .issue(
                Uuid::new_v4(),
                "a@x.com",
                UserRole::User,
                "s",
                -120,
            )
            .unwrap();

        assert!(service.verify_access_token(&token).is_err());
    }
}
