use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use common::crypto::{KeyBundleError, KeyBundlePublic};

use crate::database::Database;

/// A registered user and the key bundle they last published
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    /// Transport JSON of the user's `KeyBundlePublic`
    pub public_key_bundle: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Register a new user. Fails with a unique violation if the name is taken.
    pub async fn create(
        username: &str,
        key_bundle: &KeyBundlePublic,
        db: &Database,
    ) -> Result<User, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, public_key_bundle)
            VALUES (?1, ?2)
            "#,
        )
        .bind(username)
        .bind(key_bundle.to_json())
        .execute(&**db)
        .await?;

        Self::get(result.last_insert_rowid(), db)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get(user_id: i64, db: &Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, public_key_bundle, created_at, updated_at
            FROM users
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&**db)
        .await
    }

    pub async fn by_username(username: &str, db: &Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, public_key_bundle, created_at, updated_at
            FROM users
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&**db)
        .await
    }

    /// Decode the stored bundle.
    pub fn key_bundle(&self) -> Result<KeyBundlePublic, KeyBundleError> {
        KeyBundlePublic::from_json(&self.public_key_bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::crypto::KeyBundlePrivate;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = Database::connect(None).await.unwrap();
        let bundle = KeyBundlePrivate::generate();

        let user = User::create("alice", bundle.public(), &db).await.unwrap();
        assert_eq!(user.username, "alice");

        let found = User::by_username("alice", &db).await.unwrap().unwrap();
        assert_eq!(found.user_id, user.user_id);
        assert_eq!(&found.key_bundle().unwrap(), bundle.public());

        assert!(User::by_username("bob", &db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let db = Database::connect(None).await.unwrap();
        let bundle = KeyBundlePrivate::generate();

        User::create("alice", bundle.public(), &db).await.unwrap();
        let err = User::create("alice", bundle.public(), &db).await.unwrap_err();
        match err {
            sqlx::Error::Database(e) => assert!(e.is_unique_violation()),
            other => panic!("expected unique violation, got {other:?}"),
        }
    }
}
