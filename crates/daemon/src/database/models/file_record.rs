use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::Database;

/// Server-side record of one uploaded ciphertext blob
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub file_id: i64,
    pub owner_user_id: i64,
    pub owner_username: String,
    pub storage_path: String,
    pub metadata: Vec<u8>,
    pub metadata_nonce: Vec<u8>,
    pub pre_quantum_signature: Vec<u8>,
    pub post_quantum_signature: Vec<u8>,
    /// Milliseconds since the Unix epoch
    pub upload_timestamp: i64,
}

/// Values for a record that does not exist yet
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub owner_user_id: i64,
    pub storage_path: String,
    pub metadata: Vec<u8>,
    pub metadata_nonce: Vec<u8>,
    pub pre_quantum_signature: Vec<u8>,
    pub post_quantum_signature: Vec<u8>,
    pub upload_timestamp: i64,
}

const SELECT_FILE: &str = r#"
    SELECT
        f.file_id, f.owner_user_id, u.username AS owner_username, f.storage_path,
        f.metadata, f.metadata_nonce, f.pre_quantum_signature, f.post_quantum_signature,
        f.upload_timestamp
    FROM files f
    JOIN users u ON u.user_id = f.owner_user_id
"#;

impl FileRecord {
    /// Insert a record, returning the new `file_id`.
    pub async fn create(record: &NewFileRecord, db: &Database) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO files (
                owner_user_id, storage_path, metadata, metadata_nonce,
                pre_quantum_signature, post_quantum_signature, upload_timestamp
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(record.owner_user_id)
        .bind(&record.storage_path)
        .bind(&record.metadata)
        .bind(&record.metadata_nonce)
        .bind(&record.pre_quantum_signature)
        .bind(&record.post_quantum_signature)
        .bind(record.upload_timestamp)
        .execute(&**db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(file_id: i64, db: &Database) -> Result<Option<FileRecord>, sqlx::Error> {
        sqlx::query_as::<_, FileRecord>(&format!("{SELECT_FILE} WHERE f.file_id = ?1"))
            .bind(file_id)
            .fetch_optional(&**db)
            .await
    }

    /// A file, but only if `owner_user_id` owns it.
    pub async fn get_owned(
        file_id: i64,
        owner_user_id: i64,
        db: &Database,
    ) -> Result<Option<FileRecord>, sqlx::Error> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "{SELECT_FILE} WHERE f.file_id = ?1 AND f.owner_user_id = ?2"
        ))
        .bind(file_id)
        .bind(owner_user_id)
        .fetch_optional(&**db)
        .await
    }

    /// Every file owned by `owner_user_id`, newest first.
    pub async fn list_owned(
        owner_user_id: i64,
        db: &Database,
    ) -> Result<Vec<FileRecord>, sqlx::Error> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "{SELECT_FILE} WHERE f.owner_user_id = ?1 ORDER BY f.file_id DESC"
        ))
        .bind(owner_user_id)
        .fetch_all(&**db)
        .await
    }

    /// Every file shared with `user_id`, newest first.
    pub async fn list_shared_with(
        user_id: i64,
        db: &Database,
    ) -> Result<Vec<FileRecord>, sqlx::Error> {
        sqlx::query_as::<_, FileRecord>(&format!(
            r#"{SELECT_FILE}
            JOIN shared_access s ON s.file_id = f.file_id
            WHERE s.shared_with_user_id = ?1
            ORDER BY f.file_id DESC"#
        ))
        .bind(user_id)
        .fetch_all(&**db)
        .await
    }
}
