//! Nullifier secret persistence.

use sqlx::PgPool;

use agora_core::{TenantId, UserId};

/// The stored secret of `user_id`, storing `candidate` first if the user has
/// none. Concurrent first calls all get the secret that won the insert.
pub async fn get_or_insert(
    pool: &PgPool,
    tenant_id: &TenantId,
    user_id: &UserId,
    candidate: &[u8],
) -> Result<Vec<u8>, sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_secrets (tenant_id, user_id, secret) VALUES ($1, $2, $3)
         ON CONFLICT (tenant_id, user_id) DO NOTHING",
    )
    .bind(tenant_id.as_str())
    .bind(user_id.as_str())
    .bind(candidate)
    .execute(pool)
    .await?;

    sqlx::query_scalar::<_, Vec<u8>>(
        "SELECT secret FROM user_secrets WHERE tenant_id = $1 AND user_id = $2",
    )
    .bind(tenant_id.as_str())
    .bind(user_id.as_str())
    .fetch_one(pool)
    .await
}
