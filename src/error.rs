use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    // Auth errors
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("You are not authorized")]
    Unauthorized,
    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    // Account state errors
    #[error("Your account is not verified. Please verify your account first.")]
    AccountNotVerified,
    #[error("Your account is inactive. Please contact support.")]
    AccountInactive,
    #[error("Your account has been banned. Please contact support.")]
    AccountBanned,
    #[error("Your account has been deleted")]
    AccountDeleted,
    #[error("You do not have permission to perform this action")]
    Forbidden,

    // User errors
    #[error("User not found")]
    UserNotFound,
    #[error("User with email {0} already registered")]
    UserAlreadyExists(String),
    #[error("User is deleted")]
    UserDeleted,
    #[error("This email is already registered via {0}. Please use {0} login instead.")]
    ProviderMismatch(String),
    #[error("This account is registered via {0}. Please use {0} login instead.")]
    SocialAccountOnly(String),

    // OTP errors
    #[error("Invalid OTP")]
    InvalidOtp,
    #[error("OTP has expired. Please request a new one.")]
    OtpExpired,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Bad request: {0}")]
    BadRequest(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // JWT errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // 400 Bad Request
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidOtp => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::OtpExpired => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::SocialAccountOnly(_) => (StatusCode::BAD_REQUEST, self.to_string()),

            // 401 Unauthorized
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::WrongCurrentPassword => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Jwt(_) => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),

            // 403 Forbidden
            AppError::AccountNotVerified => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::AccountInactive => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::AccountBanned => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::AccountDeleted => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),

            // 404 Not Found
            AppError::UserNotFound => (StatusCode::NOT_FOUND, self.to_string()),

            // 409 Conflict
            AppError::UserAlreadyExists(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::UserDeleted => (StatusCode::CONFLICT, self.to_string()),
            AppError::ProviderMismatch(_) => (StatusCode::CONFLICT, self.to_string()),

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_validation_maps_to_400() {
        assert_eq!(
            status_of(AppError::Validation("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AppError::InvalidOtp), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::OtpExpired), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_credential_errors_map_to_401() {
        assert_eq!(
            status_of(AppError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AppError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AppError::WrongCurrentPassword),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_account_state_errors_map_to_403() {
        assert_eq!(
            status_of(AppError::AccountNotVerified),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(AppError::AccountBanned), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::AccountInactive), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::Forbidden), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_conflict_errors_map_to_409() {
        assert_eq!(
            status_of(AppError::UserAlreadyExists("a@x.com".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::ProviderMismatch("google".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(AppError::UserDeleted), StatusCode::CONFLICT);
    }

    #[test]
    fn test_user_not_found_maps_to_404() {
        assert_eq!(status_of(AppError::UserNotFound), StatusCode::NOT_FOUND);
    }
}
