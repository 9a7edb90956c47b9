//! # D1 User Store
//!
//! Persists subjects in a Cloudflare D1 database. The schema lives in
//! `migrations/0001_create_users.sql`:
//!
//! - `users`: one row per subject, unique on `email` and `token_digest`
//! - `photos`: JSON array of location URLs, appended in place

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use worker::wasm_bindgen::JsValue;
use worker::{D1Database, D1PreparedStatement};

use crate::errors::{AppError, AppResult};
use crate::models::{PasswordHash, Profile, UserRecord};
use crate::store::UserStore;

const SELECT_USER: &str = "SELECT id, email, username, name, description, photos, token, \
     token_digest, password_salt, password_hash, created_at FROM users";

#[derive(Deserialize)]
struct UserRow {
    id: String,
    email: String,
    username: String,
    name: Option<String>,
    description: Option<String>,
    photos: String,
    token: String,
    token_digest: String,
    password_salt: String,
    password_hash: String,
    created_at: String,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        let photos: Vec<String> = serde_json::from_str(&row.photos)
            .map_err(|e| AppError::storage(format!("corrupt photos for {}: {e}", row.id)))?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| AppError::storage(format!("corrupt created_at for {}: {e}", row.id)))?;

        Ok(UserRecord {
            id: row.id,
            email: row.email,
            profile: Profile {
                username: row.username,
                name: row.name,
                description: row.description,
                photos,
            },
            token: row.token,
            token_digest: row.token_digest,
            password: PasswordHash {
                salt: row.password_salt,
                hash: row.password_hash,
            },
            created_at,
        })
    }
}

fn optional(value: Option<&str>) -> JsValue {
    value.map(JsValue::from).unwrap_or(JsValue::NULL)
}

/// Every D1 failure surfaces as a persistence error (400), never as a bare
/// runtime error.
fn storage_error(error: worker::Error) -> AppError {
    AppError::storage(format!("D1 error: {error}"))
}

/// An UPDATE that matched no row means the subject no longer exists.
fn ensure_changed(changes: Option<usize>) -> AppResult<()> {
    match changes {
        Some(0) => Err(AppError::NotFound("User not found".to_string())),
        _ => Ok(()),
    }
}

/// User store backed by the `USERS_DB` D1 binding.
pub struct D1UserStore {
    db: D1Database,
}

impl D1UserStore {
    pub fn new(db: D1Database) -> Self {
        Self { db }
    }

    fn statement(&self, query: impl Into<String>, values: &[JsValue]) -> AppResult<D1PreparedStatement> {
        self.db.prepare(query).bind(values).map_err(storage_error)
    }

    async fn fetch_one(&self, statement: D1PreparedStatement) -> AppResult<Option<UserRecord>> {
        statement
            .first::<UserRow>(None)
            .await
            .map_err(storage_error)?
            .map(UserRecord::try_from)
            .transpose()
    }

    /// Runs an UPDATE addressed to one subject by id.
    async fn update(&self, statement: D1PreparedStatement, action: &str) -> AppResult<()> {
        let result = statement.run().await.map_err(storage_error)?;
        if !result.success() {
            return Err(AppError::storage(format!(
                "{action} failed: {}",
                result.error().unwrap_or_else(|| "unknown D1 error".to_string())
            )));
        }
        let changes = result.meta().map_err(storage_error)?.and_then(|meta| meta.changes);
        ensure_changed(changes)
    }
}

#[async_trait(?Send)]
impl UserStore for D1UserStore {
    async fn insert(&self, record: &UserRecord) -> AppResult<()> {
        let photos = serde_json::to_string(&record.profile.photos)
            .map_err(|e| AppError::storage(e.to_string()))?;
        let statement = self.statement(
            "INSERT INTO users (id, email, username, name, description, photos, token, \
             token_digest, password_salt, password_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            &[
                record.id.as_str().into(),
                record.email.as_str().into(),
                record.profile.username.as_str().into(),
                optional(record.profile.name.as_deref()),
                optional(record.profile.description.as_deref()),
                photos.into(),
                record.token.as_str().into(),
                record.token_digest.as_str().into(),
                record.password.salt.as_str().into(),
                record.password.hash.as_str().into(),
                record.created_at.to_rfc3339().into(),
            ],
        )?;

        match statement.run().await {
            Ok(result) if result.success() => Ok(()),
            Ok(result) => Err(AppError::storage(
                result.error().unwrap_or_else(|| "insert failed".to_string()),
            )),
            Err(e) if e.to_string().contains("UNIQUE constraint failed: users.email") => Err(
                AppError::validation(format!("A user with email {} already exists", record.email)),
            ),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<UserRecord>> {
        let statement = self.statement(format!("{SELECT_USER} WHERE id = ?1"), &[id.into()])?;
        self.fetch_one(statement).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let statement = self.statement(format!("{SELECT_USER} WHERE email = ?1"), &[email.into()])?;
        self.fetch_one(statement).await
    }

    async fn find_by_token_digest(&self, digest: &str) -> AppResult<Option<UserRecord>> {
        let statement =
            self.statement(format!("{SELECT_USER} WHERE token_digest = ?1"), &[digest.into()])?;
        self.fetch_one(statement).await
    }

    async fn replace_credentials(
        &self,
        id: &str,
        password: &PasswordHash,
        token: &str,
        token_digest: &str,
    ) -> AppResult<()> {
        let statement = self.statement(
            "UPDATE users SET password_salt = ?2, password_hash = ?3, token = ?4, \
             token_digest = ?5 WHERE id = ?1",
            &[
                id.into(),
                password.salt.as_str().into(),
                password.hash.as_str().into(),
                token.into(),
                token_digest.into(),
            ],
        )?;
        self.update(statement, "credential update").await
    }

    async fn append_photos(&self, id: &str, locations: &[String]) -> AppResult<()> {
        let appended =
            serde_json::to_string(locations).map_err(|e| AppError::storage(e.to_string()))?;
        let statement = self.statement(
            "UPDATE users SET photos = (SELECT json_group_array(value) FROM (\
             SELECT value FROM json_each(users.photos) \
             UNION ALL SELECT value FROM json_each(?2))) WHERE id = ?1",
            &[id.into(), appended.into()],
        )?;
        self.update(statement, "photo update").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> UserRow {
        UserRow {
            id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            name: None,
            description: Some("Host in Paris".to_string()),
            photos: r#"["https://cdn.test/a","https://cdn.test/b"]"#.to_string(),
            token: "tok".to_string(),
            token_digest: "digest".to_string(),
            password_salt: "00".to_string(),
            password_hash: "11".to_string(),
            created_at: "2024-01-15T10:30:00+00:00".to_string(),
        }
    }

    #[test]
    fn row_converts_into_record() {
        let record = UserRecord::try_from(row()).unwrap();
        assert_eq!(record.id, "u1");
        assert_eq!(record.profile.username, "alice");
        assert_eq!(record.profile.description.as_deref(), Some("Host in Paris"));
        assert_eq!(record.profile.photos, ["https://cdn.test/a", "https://cdn.test/b"]);
        assert_eq!(record.password.salt, "00");
        assert_eq!(record.created_at.to_rfc3339(), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn corrupt_photos_are_a_storage_error() {
        let mut corrupt = row();
        corrupt.photos = "not json".to_string();
        let err = UserRecord::try_from(corrupt).unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(err.to_string().contains("corrupt photos for u1"));
    }

    #[test]
    fn corrupt_timestamp_is_a_storage_error() {
        let mut corrupt = row();
        corrupt.created_at = "yesterday".to_string();
        let err = UserRecord::try_from(corrupt).unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(err.to_string().contains("corrupt created_at for u1"));
    }

    #[test]
    fn database_failures_render_as_bad_request() {
        let err = storage_error(worker::Error::RustError("D1_ERROR: database is locked".into()));
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(err.status_code(), 400);
        let message = err.to_string();
        assert!(message.starts_with("D1 error: "));
        assert!(message.contains("database is locked"));
    }

    #[test]
    fn update_of_unknown_subject_is_not_found() {
        assert!(ensure_changed(Some(1)).is_ok());
        assert!(ensure_changed(None).is_ok());
        let err = ensure_changed(Some(0)).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
