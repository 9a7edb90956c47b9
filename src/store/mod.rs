//! # User Persistence
//!
//! The [`UserStore`] trait is the only way the service reads or writes subjects.
//! Production code uses the D1 implementation; tests use the in-memory one.

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::models::{PasswordHash, UserRecord};

pub mod d1;
#[cfg(test)]
pub mod memory;

pub use d1::D1UserStore;

#[async_trait(?Send)]
pub trait UserStore {
    /// Inserts a new subject. Fails with a validation error if the email is taken.
    async fn insert(&self, record: &UserRecord) -> AppResult<()>;

    async fn find_by_id(&self, id: &str) -> AppResult<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>>;

    /// Looks a subject up by the SHA-256 digest of its bearer token.
    async fn find_by_token_digest(&self, digest: &str) -> AppResult<Option<UserRecord>>;

    /// Replaces password hash and token in a single write.
    async fn replace_credentials(
        &self,
        id: &str,
        password: &PasswordHash,
        token: &str,
        token_digest: &str,
    ) -> AppResult<()>;

    /// Appends `locations` to the subject's photos in a single write.
    async fn append_photos(&self, id: &str, locations: &[String]) -> AppResult<()>;
}
