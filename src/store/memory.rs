use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::{AppError, AppResult};
use crate::models::{PasswordHash, UserRecord};
use crate::store::UserStore;

/// In-memory user store used by unit tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RefCell<HashMap<String, UserRecord>>,
    fail_writes: Cell<bool>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a storage error.
    pub fn fail_writes(&self) {
        self.fail_writes.set(true);
    }

    pub fn get(&self, id: &str) -> Option<UserRecord> {
        self.users.borrow().get(id).cloned()
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.get() {
            Err(AppError::storage("simulated write failure"))
        } else {
            Ok(())
        }
    }

    fn find(&self, predicate: impl Fn(&UserRecord) -> bool) -> Option<UserRecord> {
        self.users.borrow().values().find(|u| predicate(u)).cloned()
    }
}

#[async_trait(?Send)]
impl UserStore for MemoryUserStore {
    async fn insert(&self, record: &UserRecord) -> AppResult<()> {
        self.check_writable()?;
        if self.find(|u| u.email == record.email).is_some() {
            return Err(AppError::validation(format!(
                "A user with email {} already exists",
                record.email
            )));
        }
        self.users
            .borrow_mut()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.find(|u| u.email == email))
    }

    async fn find_by_token_digest(&self, digest: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.find(|u| u.token_digest == digest))
    }

    async fn replace_credentials(
        &self,
        id: &str,
        password: &PasswordHash,
        token: &str,
        token_digest: &str,
    ) -> AppResult<()> {
        self.check_writable()?;
        let mut users = self.users.borrow_mut();
        let user = users
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.password = password.clone();
        user.token = token.to_string();
        user.token_digest = token_digest.to_string();
        Ok(())
    }

    async fn append_photos(&self, id: &str, locations: &[String]) -> AppResult<()> {
        self.check_writable()?;
        let mut users = self.users.borrow_mut();
        let user = users
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.profile.photos.extend_from_slice(locations);
        Ok(())
    }
}
