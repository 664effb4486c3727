use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::OtpConfig,
    error::{AppError, AppResult},
    models::Otp,
};

/// Issues and looks up one-time codes. A user has at most one live code:
/// issuing deletes every prior row for that user in the same transaction
/// as the insert, so a stale code can never validate after a resend.
#[derive(Clone)]
pub struct OtpService {
    db: PgPool,
    config: OtpConfig,
}

impl OtpService {
    pub fn new(db: PgPool, config: OtpConfig) -> Self {
        Self { db, config }
    }

    pub async fn issue(&self, user_id: Uuid) -> AppResult<Otp> {
        let code = generate_code();
        let expires_at = Utc::now() + Duration::seconds(self.config.ttl.as_secs() as i64);

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM otps WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let otp: Otp = sqlx::query_as(
            r#"
            INSERT INTO otps (id, user_id, code, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(code)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(otp)
    }

    pub async fn latest_for_user(&self, user_id: Uuid) -> AppResult<Option<Otp>> {
        let otp = sqlx::query_as(
            "SELECT * FROM otps WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(otp)
    }

    /// Precondition checks shared by the signup and password-reset flows;
    /// expiry is reported before a code mismatch so the caller learns to
    /// request a fresh code rather than retyping a dead one.
    pub fn check(&self, otp: Option<&Otp>, submitted: i32, now: DateTime<Utc>) -> AppResult<()> {
        let otp = match otp {
            Some(otp) if !otp.is_expired(now) => otp,
            _ => return Err(AppError::OtpExpired),
        };

        if otp.code != submitted {
            return Err(AppError::InvalidOtp);
        }

        Ok(())
    }
}

pub fn generate_code() -> i32 {
    rand::thread_rng().gen_range(100_000..1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..1000 {
            let code = generate_code();
            assert!((100_000..1_000_000).contains(&code), "got {code}");
        }
    }

    fn service_for_checks() -> OtpService {
        // check() never touches the pool
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        OtpService::new(
            pool,
            OtpConfig {
                ttl: StdDuration::from_secs(300),
            },
        )
    }

    fn otp_with(code: i32, expires_at: DateTime<Utc>) -> Otp {
        Otp {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            code,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_check_accepts_matching_live_code() {
        let now = Utc::now();
        let otp = otp_with(123456, now + Duration::minutes(5));
        assert!(service_for_checks().check(Some(&otp), 123456, now).is_ok());
    }

    #[tokio::test]
    async fn test_check_rejects_wrong_code() {
        let now = Utc::now();
        let otp = otp_with(123456, now + Duration::minutes(5));
        assert!(matches!(
            service_for_checks().check(Some(&otp), 654321, now),
            Err(AppError::InvalidOtp)
        ));
    }

    #[tokio::test]
    async fn test_check_rejects_expired_code_even_if_correct() {
        let now = Utc::now();
        let otp = otp_with(123456, now - Duration::seconds(1));
        assert!(matches!(
            service_for_checks().check(Some(&otp), 123456, now),
            Err(AppError::OtpExpired)
        ));
    }

    #[tokio::test]
    async fn test_check_rejects_missing_code() {
        let now = Utc::now();
        assert!(matches!(
            service_for_checks().check(None, 123456, now),
            Err(AppError::OtpExpired)
        ));
    }

    async fn seed_user(db: &PgPool, email: &str) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO users (id, email, name, is_verified) \
             VALUES ($1, $2, 'Test', FALSE) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .fetch_one(db)
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn test_reissue_supersedes_previous_code(db: PgPool) {
        let user_id = seed_user(&db, "otp@x.com").await;
        let service = OtpService::new(
            db.clone(),
            OtpConfig {
                ttl: StdDuration::from_secs(300),
            },
        );

        let first = service.issue(user_id).await.unwrap();
        let second = service.issue(user_id).await.unwrap();

        // Exactly one row survives the reissue
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM otps WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let latest = service.latest_for_user(user_id).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);

        // The old code must no longer validate (unless the fresh code
        // happened to collide with it)
        if first.code != second.code {
            assert!(matches!(
                service.check(Some(&latest), first.code, Utc::now()),
                Err(AppError::InvalidOtp)
            ));
        }
        assert!(service
            .check(Some(&latest), second.code, Utc::now())
            .is_ok());
    }

    #[sqlx::test]
    async fn test_issue_sets_expiry_from_configured_window(db: PgPool) {
        let user_id = seed_user(&db, "window@x.com").await;
        let service = OtpService::new(
            db,
            OtpConfig {
                ttl: StdDuration::from_secs(300),
            },
        );

        let before = Utc::now();
        let otp = service.issue(user_id).await.unwrap();

        let window = otp.expires_at - before;
        assert!(window <= Duration::seconds(301));
        assert!(window >= Duration::seconds(295));
        assert!((100_000..1_000_000).contains(&otp.code));
    }
}
