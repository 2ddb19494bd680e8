//! Auth identity repository

use crate::domain::{
    generate_id, prefix, AuthIdentity, CreateAuthIdentityInput, Metadata, ProviderIdentity,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySqlPool};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthIdentityRepository: Send + Sync {
    async fn create(&self, input: &CreateAuthIdentityInput) -> Result<AuthIdentity>;
    /// Load an identity together with its provider identities
    async fn find_by_id(&self, id: &str) -> Result<Option<AuthIdentity>>;
    async fn find_by_provider_entity(
        &self,
        provider: &str,
        entity_id: &str,
    ) -> Result<Option<AuthIdentity>>;
    /// Merge `partial` into `app_metadata`, keeping keys it does not mention
    async fn merge_app_metadata(&self, id: &str, partial: &Metadata) -> Result<()>;
}

#[derive(FromRow)]
struct AuthIdentityRow {
    id: String,
    #[sqlx(json)]
    app_metadata: Metadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ProviderIdentityRow {
    id: String,
    auth_identity_id: String,
    provider: String,
    entity_id: String,
    #[sqlx(json)]
    user_metadata: Metadata,
    #[sqlx(json)]
    provider_metadata: Metadata,
    created_at: DateTime<Utc>,
}

impl From<ProviderIdentityRow> for ProviderIdentity {
    fn from(row: ProviderIdentityRow) -> Self {
        Self {
            id: row.id,
            auth_identity_id: row.auth_identity_id,
            provider: row.provider,
            entity_id: row.entity_id,
            user_metadata: row.user_metadata,
            provider_metadata: row.provider_metadata,
            created_at: row.created_at,
        }
    }
}

fn to_json(metadata: &Metadata) -> Result<String> {
    serde_json::to_string(metadata).map_err(|e| AppError::Internal(e.into()))
}

pub struct AuthIdentityRepositoryImpl {
    pool: MySqlPool,
}

impl AuthIdentityRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn load_provider_identities(&self, auth_identity_id: &str) -> Result<Vec<ProviderIdentity>> {
        let rows = sqlx::query_as::<_, ProviderIdentityRow>(
            r#"
            SELECT id, auth_identity_id, provider, entity_id, user_metadata,
                   provider_metadata, created_at
            FROM provider_identities
            WHERE auth_identity_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(auth_identity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ProviderIdentity::from).collect())
    }
}

#[async_trait]
impl AuthIdentityRepository for AuthIdentityRepositoryImpl {
    async fn create(&self, input: &CreateAuthIdentityInput) -> Result<AuthIdentity> {
        let id = generate_id(prefix::AUTH_IDENTITY);
        let provider_identity_id = generate_id(prefix::PROVIDER_IDENTITY);
        let user_metadata = to_json(&input.user_metadata)?;
        let provider_metadata = to_json(&input.provider_metadata)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO auth_identities (id, app_metadata, created_at, updated_at)
            VALUES (?, JSON_OBJECT(), NOW(), NOW())
            "#,
        )
        .bind(&id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO provider_identities (id, auth_identity_id, provider, entity_id,
                                             user_metadata, provider_metadata, created_at)
            VALUES (?, ?, ?, ?, CAST(? AS JSON), CAST(? AS JSON), NOW())
            "#,
        )
        .bind(&provider_identity_id)
        .bind(&id)
        .bind(&input.provider)
        .bind(&input.entity_id)
        .bind(&user_metadata)
        .bind(&provider_metadata)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::from_write(e, "Identity with this email"))?;

        tx.commit().await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create auth identity")))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AuthIdentity>> {
        let row = sqlx::query_as::<_, AuthIdentityRow>(
            r#"
            SELECT id, app_metadata, created_at, updated_at
            FROM auth_identities
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let provider_identities = self.load_provider_identities(&row.id).await?;

        Ok(Some(AuthIdentity {
            id: row.id,
            provider_identities,
            app_metadata: row.app_metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn find_by_provider_entity(
        &self,
        provider: &str,
        entity_id: &str,
    ) -> Result<Option<AuthIdentity>> {
        let auth_identity_id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT auth_identity_id
            FROM provider_identities
            WHERE provider = ? AND entity_id = ?
            "#,
        )
        .bind(provider)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        match auth_identity_id {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn merge_app_metadata(&self, id: &str, partial: &Metadata) -> Result<()> {
        let patch = to_json(partial)?;

        let result = sqlx::query(
            r#"
            UPDATE auth_identities
            SET app_metadata = JSON_MERGE_PATCH(COALESCE(app_metadata, JSON_OBJECT()), CAST(? AS JSON)),
                updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(&patch)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Auth identity not found".to_string()));
        }

        Ok(())
    }
}
