use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use common::crypto::SharePayload;

use crate::database::Database;

/// Wrapped key material granting `shared_with_user_id` access to a file
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SharedAccess {
    pub access_id: i64,
    pub owner_user_id: i64,
    pub shared_with_user_id: i64,
    pub file_id: i64,
    pub encrypted_fek: Vec<u8>,
    pub encrypted_fek_nonce: Vec<u8>,
    pub encrypted_mek: Vec<u8>,
    pub encrypted_mek_nonce: Vec<u8>,
    pub ephemeral_public_key: Vec<u8>,
    pub metadata_nonce: Vec<u8>,
    pub file_content_nonce: Vec<u8>,
    pub shared_at: OffsetDateTime,
}

impl From<SharedAccess> for SharePayload {
    fn from(access: SharedAccess) -> Self {
        SharePayload {
            ephemeral_public_key: access.ephemeral_public_key,
            encrypted_fek: access.encrypted_fek,
            encrypted_fek_nonce: access.encrypted_fek_nonce,
            encrypted_mek: access.encrypted_mek,
            encrypted_mek_nonce: access.encrypted_mek_nonce,
            file_content_nonce: access.file_content_nonce,
            metadata_nonce: access.metadata_nonce,
        }
    }
}

impl SharedAccess {
    /// Insert a grant, returning the new `access_id`. A second grant for the
    /// same (owner, recipient, file) fails with a unique violation.
    pub async fn create(
        owner_user_id: i64,
        shared_with_user_id: i64,
        file_id: i64,
        payload: &SharePayload,
        db: &Database,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO shared_access (
                owner_user_id, shared_with_user_id, file_id,
                encrypted_fek, encrypted_fek_nonce, encrypted_mek, encrypted_mek_nonce,
                ephemeral_public_key, metadata_nonce, file_content_nonce
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(owner_user_id)
        .bind(shared_with_user_id)
        .bind(file_id)
        .bind(&payload.encrypted_fek)
        .bind(&payload.encrypted_fek_nonce)
        .bind(&payload.encrypted_mek)
        .bind(&payload.encrypted_mek_nonce)
        .bind(&payload.ephemeral_public_key)
        .bind(&payload.metadata_nonce)
        .bind(&payload.file_content_nonce)
        .execute(&**db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// The grant for `file_id` to `shared_with_user_id`, if any.
    pub async fn for_recipient(
        file_id: i64,
        shared_with_user_id: i64,
        db: &Database,
    ) -> Result<Option<SharedAccess>, sqlx::Error> {
        sqlx::query_as::<_, SharedAccess>(
            r#"
            SELECT
                access_id, owner_user_id, shared_with_user_id, file_id,
                encrypted_fek, encrypted_fek_nonce, encrypted_mek, encrypted_mek_nonce,
                ephemeral_public_key, metadata_nonce, file_content_nonce, shared_at
            FROM shared_access
            WHERE file_id = ?1 AND shared_with_user_id = ?2
            "#,
        )
        .bind(file_id)
        .bind(shared_with_user_id)
        .fetch_optional(&**db)
        .await
    }

    /// Usernames `file_id` is shared with.
    pub async fn recipients(file_id: i64, db: &Database) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.username
            FROM shared_access s
            JOIN users u ON u.user_id = s.shared_with_user_id
            WHERE s.file_id = ?1
            ORDER BY u.username
            "#,
        )
        .bind(file_id)
        .fetch_all(&**db)
        .await
    }

    /// Delete a grant. Returns whether one existed.
    pub async fn revoke(
        owner_user_id: i64,
        shared_with_user_id: i64,
        file_id: i64,
        db: &Database,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM shared_access
            WHERE owner_user_id = ?1 AND shared_with_user_id = ?2 AND file_id = ?3
            "#,
        )
        .bind(owner_user_id)
        .bind(shared_with_user_id)
        .bind(file_id)
        .execute(&**db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
