use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{AuthProvider, AuthUser, OtpPurpose, UserSummary},
    services::auth::{AuthService, LoginMetadata},
    AppState,
};

const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.email.clone(),
        state.social.clone(),
        &state.config,
    )
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserSummary>)> {
    if req.email.is_empty() || req.password.is_empty() || req.name.is_empty() {
        return Err(AppError::Validation(
            "email, password and name are required".to_string(),
        ));
    }

    let user = auth_service(&state)
        .register(&req.email, &req.password, &req.name)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserSummary,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let metadata = LoginMetadata {
        ip_address: client_ip(&headers),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string()),
    };

    let outcome = auth_service(&state)
        .login(&req.email, &req.password, metadata)
        .await?;

    let jar = jar.add(refresh_cookie(&state, outcome.refresh_token));

    Ok((
        jar,
        Json(LoginResponse {
            access_token: outcome.access_token,
            user: outcome.user,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SocialLoginRequest {
    pub token: String,
    pub provider: AuthProvider,
}

pub async fn social_login(
    State(state): State<AppState>,
    Json(req): Json<SocialLoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (access_token, user) = auth_service(&state)
        .social_login(&req.token, req.provider)
        .await?;

    Ok(Json(LoginResponse { access_token, user }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: i32,
}

pub async fn verify_signup_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> AppResult<Json<MessageResponse>> {
    auth_service(&state)
        .verify_signup_otp(&req.email, req.otp)
        .await?;

    Ok(message("Email verified successfully"))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> AppResult<Json<MessageResponse>> {
    auth_service(&state)
        .verify_reset_otp(&req.email, req.otp)
        .await?;

    Ok(message("OTP verified successfully"))
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

pub async fn resend_signup_otp(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    auth_service(&state)
        .resend_otp(&req.email, OtpPurpose::Signup)
        .await?;

    Ok(message(
        "New OTP has been sent to your email for email verification",
    ))
}

pub async fn resend_reset_otp(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    auth_service(&state)
        .resend_otp(&req.email, OtpPurpose::PasswordReset)
        .await?;

    Ok(message(
        "New OTP has been sent to your email for password reset",
    ))
}

pub async fn forget_password(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    auth_service(&state).forget_password(&req.email).await?;

    Ok(message("OTP has been sent to your email for password reset"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    auth_service(&state)
        .reset_password(&req.email, &req.new_password, &req.confirm_password)
        .await?;

    Ok(message("Password reset successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    auth_service(&state)
        .change_password(
            user.id,
            &req.current_password,
            &req.new_password,
            &req.confirm_password,
        )
        .await?;

    Ok(message("Password changed successfully"))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<UserSummary>> {
    let user = auth_service(&state).get_me(user.id).await?;
    Ok(Json(user))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<Json<RefreshResponse>> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AppError::Unauthorized)?;

    let access_token = auth_service(&state).refresh_token(&token).await?;

    Ok(Json(RefreshResponse { access_token }))
}

fn refresh_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(REFRESH_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(state.config.server.environment == "production");
    cookie.set_max_age(time::Duration::seconds(
        state.config.jwt.refresh_ttl.as_secs() as i64,
    ));
    cookie
}

/// First hop of X-Forwarded-For, for deployments behind a proxy.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_client_ip_absent() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
