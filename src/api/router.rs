use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use super::{
    handlers,
    middleware::{auth_middleware, ADMINS, ANY_ROLE, SUPER_ADMIN_ONLY},
};
use crate::AppState;

pub fn create_router(state: AppState) -> Router<AppState> {
    // Public auth routes
    let auth_public = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/social-login", post(handlers::auth::social_login))
        .route("/verify-signup-otp", post(handlers::auth::verify_signup_otp))
        .route("/resend-otp/signup", post(handlers::auth::resend_signup_otp))
        .route("/verify-otp", post(handlers::auth::verify_otp))
        .route(
            "/resend-otp/forgot-password",
            post(handlers::auth::resend_reset_otp),
        )
        .route("/forget-password", post(handlers::auth::forget_password))
        .route("/reset-password", post(handlers::auth::reset_password))
        .route("/refresh-token", post(handlers::auth::refresh_token));

    // Protected auth routes
    let auth_protected = Router::new()
        .route("/change-password", put(handlers::auth::change_password))
        .route("/me", get(handlers::auth::me))
        .layer(middleware::from_fn_with_state(
            (state.clone(), ANY_ROLE),
            auth_middleware,
        ));

    // User management; profile update allows self-service (ownership is
    // checked in the service), everything else is admin territory
    let user_admin_routes = Router::new()
        .route("/", get(handlers::users::list_users))
        .route(
            "/:user_id",
            get(handlers::users::get_user).delete(handlers::users::delete_user),
        )
        .route(
            "/:user_id/login-activities",
            get(handlers::users::login_activities),
        )
        .layer(middleware::from_fn_with_state(
            (state.clone(), ADMINS),
            auth_middleware,
        ));

    let user_self_routes = Router::new()
        .route("/:user_id", patch(handlers::users::update_user))
        .layer(middleware::from_fn_with_state(
            (state.clone(), ANY_ROLE),
            auth_middleware,
        ));

    let user_role_routes = Router::new()
        .route("/:user_id/role", patch(handlers::users::update_user_role))
        .layer(middleware::from_fn_with_state(
            (state.clone(), SUPER_ADMIN_ONLY),
            auth_middleware,
        ));

    let file_routes = Router::new()
        .route("/upload", post(handlers::files::upload))
        .route("/upload-multiple", post(handlers::files::upload_multiple))
        .layer(middleware::from_fn_with_state(
            (state.clone(), ANY_ROLE),
            auth_middleware,
        ));

    Router::new()
        .nest("/auth", auth_public.merge(auth_protected))
        .nest(
            "/users",
            user_admin_routes.merge(user_self_routes).merge(user_role_routes),
        )
        .nest("/files", file_routes)
}
