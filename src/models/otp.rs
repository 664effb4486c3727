use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Otp {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Otp {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// What an OTP email is proving; picks the subject line and copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Signup,
    PasswordReset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn otp_expiring_at(expires_at: DateTime<Utc>) -> Otp {
        Otp {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            code: 123456,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_otp_live_before_expiry() {
        let now = Utc::now();
        let otp = otp_expiring_at(now + Duration::minutes(5));
        assert!(!otp.is_expired(now));
    }

    #[test]
    fn test_otp_expired_strictly_in_the_past() {
        let now = Utc::now();
        assert!(otp_expiring_at(now - Duration::seconds(1)).is_expired(now));
        // Expiry boundary counts as expired
        assert!(otp_expiring_at(now).is_expired(now));
    }
}
