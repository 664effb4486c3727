use sqlx::PgPool;
use uuid::Uuid;

use crate::{config::Config, services::auth::hash_password};

/// Creates the first SUPER_ADMIN from env credentials if none exists.
/// Runs off the startup path; any failure is logged and the server keeps
/// serving.
pub async fn seed_super_admin(db: PgPool, config: &Config) -> anyhow::Result<()> {
    let existing: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM users WHERE role = 'SUPER_ADMIN' LIMIT 1")
            .fetch_optional(&db)
            .await?;

    if existing.is_some() {
        tracing::debug!("Super admin already exists, skipping seed");
        return Ok(());
    }

    let (Some(email), Some(password)) = (
        config.super_admin.email.clone(),
        config.super_admin.password.clone(),
    ) else {
        tracing::warn!("Super admin credentials not configured, skipping seed");
        return Ok(());
    };

    let password_hash = hash_password(password).await?;

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password, name, role, status, provider, is_verified)
        VALUES ($1, $2, $3, 'Super Admin', 'SUPER_ADMIN', 'Active', 'local', TRUE)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&password_hash)
    .execute(&db)
    .await?;

    tracing::info!("Super admin seeded: {}", email);
    Ok(())
}
