use std::sync::Arc;

use bcrypt::DEFAULT_COST;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{parse_user_agent, AuthProvider, OtpPurpose, User, UserStatus, UserSummary},
    services::{
        email::{EmailDispatcher, OutboundEmail},
        otp::OtpService,
        social::{SocialProfile, SocialTokenVerifier},
        token::TokenService,
    },
};

/// Context about the connection making a login attempt, kept for the
/// append-only audit trail.
#[derive(Debug, Clone, Default)]
pub struct LoginMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

pub struct AuthService {
    db: PgPool,
    tokens: TokenService,
    otps: OtpService,
    email: EmailDispatcher,
    social: Arc<SocialTokenVerifier>,
}

impl AuthService {
    pub fn new(
        db: PgPool,
        email: EmailDispatcher,
        social: Arc<SocialTokenVerifier>,
        config: &Config,
    ) -> Self {
        Self {
            tokens: TokenService::new(config.jwt.clone()),
            otps: OtpService::new(db.clone(), config.otp.clone()),
            db,
            email,
            social,
        }
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> AppResult<UserSummary> {
        let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        if existing.is_some() {
            return Err(AppError::UserAlreadyExists(email.to_string()));
        }

        let password_hash = hash_password(password.to_string()).await?;

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, password, name, provider, is_verified)
            VALUES ($1, $2, $3, $4, 'local', FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(&password_hash)
        .bind(name)
        .fetch_one(&self.db)
        .await?;

        let otp = self.otps.issue(user.id).await?;
        self.email.enqueue(OutboundEmail::Otp {
            to: user.email.clone(),
            code: otp.code,
            purpose: OtpPurpose::Signup,
        });

        Ok(UserSummary::from(&user))
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        metadata: LoginMetadata,
    ) -> AppResult<LoginOutcome> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        let user = user.ok_or(AppError::UserNotFound)?;

        if !user.is_verified {
            self.record_login(&user, &metadata, Some("Email not verified"))
                .await;
            return Err(AppError::AccountNotVerified);
        }

        if user.is_deleted {
            self.record_login(&user, &metadata, Some("Account deleted"))
                .await;
            return Err(AppError::AccountDeleted);
        }

        match user.status {
            UserStatus::Inactive => {
                self.record_login(&user, &metadata, Some("Account inactive"))
                    .await;
                return Err(AppError::AccountInactive);
            }
            UserStatus::Banned => {
                self.record_login(&user, &metadata, Some("Account banned"))
                    .await;
                return Err(AppError::AccountBanned);
            }
            UserStatus::Active => {}
        }

        let Some(stored_hash) = user.password.clone() else {
            self.record_login(&user, &metadata, Some("Social login required"))
                .await;
            return Err(AppError::SocialAccountOnly(user.provider.as_str().to_string()));
        };

        if !verify_password(password.to_string(), stored_hash).await? {
            self.record_login(&user, &metadata, Some("Invalid credentials"))
                .await;
            return Err(AppError::InvalidCredentials);
        }

        self.record_login(&user, &metadata, None).await;

        let access_token = self
            .tokens
            .issue_access_token(user.id, &user.email, user.role)?;
        let refresh_token = self
            .tokens
            .issue_refresh_token(user.id, &user.email, user.role)?;

        Ok(LoginOutcome {
            access_token,
            refresh_token,
            user: UserSummary::from(&user),
        })
    }

    pub async fn verify_signup_otp(&self, email: &str, code: i32) -> AppResult<()> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        let user = user.ok_or(AppError::UserNotFound)?;

        if user.is_verified {
            return Err(AppError::BadRequest("User already verified".to_string()));
        }

        let otp = self.otps.latest_for_user(user.id).await?;
        self.otps.check(otp.as_ref(), code, Utc::now())?;

        let mut tx = self.db.begin().await?;
        sqlx::query("UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM otps WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.email.enqueue(OutboundEmail::Welcome {
            to: user.email.clone(),
            name: user.name.clone(),
        });

        Ok(())
    }

    /// OTP check for the forgot-password flow; consuming the code here is
    /// what authorizes the following reset_password call.
    pub async fn verify_reset_otp(&self, email: &str, code: i32) -> AppResult<()> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        let user = user.ok_or(AppError::UserNotFound)?;

        let otp = self.otps.latest_for_user(user.id).await?;
        self.otps.check(otp.as_ref(), code, Utc::now())?;

        sqlx::query("DELETE FROM otps WHERE user_id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    pub async fn resend_otp(&self, email: &str, purpose: OtpPurpose) -> AppResult<()> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        let user = user.ok_or(AppError::UserNotFound)?;

        let otp = self.otps.issue(user.id).await?;
        self.email.enqueue(OutboundEmail::Otp {
            to: user.email.clone(),
            code: otp.code,
            purpose,
        });

        Ok(())
    }

    pub async fn forget_password(&self, email: &str) -> AppResult<()> {
        self.resend_otp(email, OtpPurpose::PasswordReset).await
    }

    pub async fn reset_password(
        &self,
        email: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> AppResult<()> {
        if new_password != confirm_password {
            return Err(AppError::BadRequest(
                "New password and confirm password do not match".to_string(),
            ));
        }

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        let user = user.ok_or(AppError::UserNotFound)?;

        let password_hash = hash_password(new_password.to_string()).await?;
        sqlx::query("UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2")
            .bind(&password_hash)
            .bind(user.id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> AppResult<()> {
        // Mismatch is reported regardless of whether the current password holds
        if new_password != confirm_password {
            return Err(AppError::BadRequest(
                "New password and confirm password do not match".to_string(),
            ));
        }

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        let user = user.ok_or(AppError::UserNotFound)?;

        let Some(stored_hash) = user.password.clone() else {
            return Err(AppError::SocialAccountOnly(user.provider.as_str().to_string()));
        };

        if !verify_password(current_password.to_string(), stored_hash).await? {
            return Err(AppError::WrongCurrentPassword);
        }

        let password_hash = hash_password(new_password.to_string()).await?;
        sqlx::query("UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2")
            .bind(&password_hash)
            .bind(user.id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Exchanges a live refresh token for a fresh access token. Refresh
    /// tokens are not rotated.
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<String> {
        let claims = self
            .tokens
            .verify_refresh_token(refresh_token)
            .map_err(|_| AppError::InvalidToken)?;

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(claims.id)
            .fetch_optional(&self.db)
            .await?;
        let user = user.ok_or(AppError::UserNotFound)?;

        self.tokens
            .issue_access_token(user.id, &user.email, user.role)
    }

    pub async fn social_login(
        &self,
        token: &str,
        provider: AuthProvider,
    ) -> AppResult<(String, UserSummary)> {
        let profile = self.social.verify(token, provider).await?;
        let user = self.upsert_social_account(&profile, provider).await?;

        let access_token = self
            .tokens
            .issue_access_token(user.id, &user.email, user.role)?;

        Ok((access_token, UserSummary::from(&user)))
    }

    async fn upsert_social_account(
        &self,
        profile: &SocialProfile,
        provider: AuthProvider,
    ) -> AppResult<User> {
        let mut tx = self.db.begin().await?;

        let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(&profile.email)
            .fetch_optional(&mut *tx)
            .await?;

        let user = match existing {
            Some(user) if user.provider != provider => {
                return Err(AppError::ProviderMismatch(user.provider.as_str().to_string()));
            }
            // Conflict rather than Forbidden: the address is taken by a
            // tombstoned record, there is no session to forbid yet
            Some(user) if user.is_deleted => {
                return Err(AppError::UserDeleted);
            }
            Some(user) => {
                if profile.picture.is_some() && user.profile_pic != profile.picture {
                    sqlx::query(
                        "UPDATE users SET profile_pic = $1, updated_at = NOW() WHERE id = $2",
                    )
                    .bind(&profile.picture)
                    .bind(user.id)
                    .execute(&mut *tx)
                    .await?;
                }
                user
            }
            None => {
                // First social sign-in creates a pre-verified, passwordless account
                sqlx::query_as(
                    r#"
                    INSERT INTO users (id, email, name, provider, is_verified, profile_pic)
                    VALUES ($1, $2, $3, $4, TRUE, $5)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&profile.email)
                .bind(&profile.name)
                .bind(provider)
                .bind(&profile.picture)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        Ok(user)
    }

    pub async fn get_me(&self, user_id: Uuid) -> AppResult<UserSummary> {
        let user: Option<UserSummary> = sqlx::query_as(
            "SELECT id, email, name, role, is_verified, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        user.ok_or(AppError::UserNotFound)
    }

    // Audit writes sit outside the flow's error path on purpose: a failed
    // attempt must leave its row behind, and a failed insert must not turn
    // a successful login into an error.
    async fn record_login(&self, user: &User, metadata: &LoginMetadata, failure: Option<&str>) {
        let device = metadata
            .user_agent
            .as_deref()
            .map(parse_user_agent)
            .unwrap_or_default();

        let result = sqlx::query(
            r#"
            INSERT INTO login_activities
                (id, user_id, ip_address, user_agent, device_type, browser, os, platform,
                 is_successful, failure_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(&metadata.ip_address)
        .bind(&metadata.user_agent)
        .bind(&device.device_type)
        .bind(&device.browser)
        .bind(&device.os)
        .bind(&device.platform)
        .bind(failure.is_none())
        .bind(failure)
        .execute(&self.db)
        .await;

        if let Err(e) = result {
            tracing::warn!("Failed to record login activity for {}: {}", user.id, e);
        }
    }
}

pub async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Hash task failed: {e}")))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Hash error: {e}")))
}

pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Verify task failed: {e}")))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Verify error: {e}")))
}
