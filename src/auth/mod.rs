//! # Credential Authority
//!
//! Issues, verifies and rotates subject credentials. Authentication is
//! stateless per request: the stored bearer token is the only server-side
//! session state.
//!
//! ## Credential kinds
//!
//! - **Password**: verified against a salted PBKDF2 hash, never stored
//! - **Bearer**: looked up by its SHA-256 digest, then compared in constant
//!   time with the stored token
//!
//! Every authentication failure is reported as [`AppError::Unauthorized`],
//! so an unknown identifier and a wrong password look the same to callers.

use chrono::Utc;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::middleware::ValidationMiddleware;
use crate::models::{Credential, Profile, SignUpRequest, Subject, UserRecord};
use crate::store::UserStore;

pub mod password;
pub mod token;

use password::{burn_verification, hash_password, verify_password};
use token::{constant_time_eq, generate_token, token_digest};

pub struct CredentialAuthority<S> {
    store: S,
}

impl<S: UserStore> CredentialAuthority<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a new subject and issues its first bearer token.
    pub async fn issue(&self, request: &SignUpRequest) -> AppResult<Subject> {
        let email = ValidationMiddleware::require_field(&request.email, "email")?;
        ValidationMiddleware::validate_email(email)?;
        let username = ValidationMiddleware::require_field(&request.username, "username")?;
        let password = ValidationMiddleware::require_secret(&request.password, "password")?;

        if self.store.find_by_email(email).await?.is_some() {
            return Err(AppError::validation(format!(
                "A user with email {email} already exists"
            )));
        }

        let token = generate_token();
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            profile: Profile {
                username: username.to_string(),
                name: non_blank(&request.name),
                description: non_blank(&request.description),
                photos: Vec::new(),
            },
            token_digest: token_digest(&token),
            token,
            password: hash_password(password),
            created_at: Utc::now(),
        };

        self.store.insert(&record).await?;
        Ok(record.into())
    }

    /// Dispatches on the credential kind.
    pub async fn verify(&self, credential: &Credential) -> AppResult<Subject> {
        match credential {
            Credential::Password {
                identifier,
                password,
            } => self.verify_password(identifier, password).await,
            Credential::Bearer { token } => self.verify_bearer(token).await,
        }
    }

    pub async fn verify_password(&self, identifier: &str, password: &str) -> AppResult<Subject> {
        let Some(record) = self.store.find_by_email(identifier).await? else {
            burn_verification(password);
            return Err(AppError::Unauthorized);
        };

        if verify_password(password, &record.password) {
            Ok(record.into())
        } else {
            Err(AppError::Unauthorized)
        }
    }

    pub async fn verify_bearer(&self, token: &str) -> AppResult<Subject> {
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        match self.store.find_by_token_digest(&token_digest(token)).await? {
            Some(record) if constant_time_eq(record.token.as_bytes(), token.as_bytes()) => {
                Ok(record.into())
            }
            _ => Err(AppError::Unauthorized),
        }
    }

    /// Replaces the password of an already authenticated subject and issues a
    /// new token. The previous token stops authenticating once this returns.
    pub async fn change_password(
        &self,
        subject: &Subject,
        current: &Option<String>,
        replacement: &Option<String>,
    ) -> AppResult<Subject> {
        let current = ValidationMiddleware::require_secret(current, "password")?;
        let replacement = ValidationMiddleware::require_secret(replacement, "new_password")?;

        let verified = self.verify_password(&subject.email, current).await?;
        if verified.id != subject.id {
            return Err(AppError::Unauthorized);
        }

        let token = generate_token();
        self.store
            .replace_credentials(
                &subject.id,
                &hash_password(replacement),
                &token,
                &token_digest(&token),
            )
            .await?;

        Ok(Subject { token, ..verified })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryUserStore;
    use futures::executor::block_on;

    fn sign_up(email: &str, password: &str) -> SignUpRequest {
        SignUpRequest {
            email: Some(email.to_string()),
            username: Some("alice".to_string()),
            name: Some("Alice".to_string()),
            description: Some("  ".to_string()),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn issue_creates_subject_with_fresh_token() {
        let authority = CredentialAuthority::new(MemoryUserStore::new());
        let subject = block_on(authority.issue(&sign_up("alice@example.com", "pw"))).unwrap();

        assert_eq!(subject.token.len(), crate::constants::TOKEN_LENGTH);
        assert_eq!(subject.profile.username, "alice");
        assert_eq!(subject.profile.name.as_deref(), Some("Alice"));
        assert_eq!(subject.profile.description, None);

        let stored = authority.store().get(&subject.id).unwrap();
        assert_eq!(stored.token_digest, token_digest(&subject.token));
        assert_ne!(stored.password.hash, "pw");
    }

    #[test]
    fn issue_never_repeats_tokens() {
        let authority = CredentialAuthority::new(MemoryUserStore::new());
        let tokens: std::collections::HashSet<String> = (0..50)
            .map(|i| {
                block_on(authority.issue(&sign_up(&format!("user{i}@example.com"), "pw")))
                    .unwrap()
                    .token
            })
            .collect();
        assert_eq!(tokens.len(), 50);
    }

    #[test]
    fn issue_rejects_duplicates_and_missing_fields() {
        let authority = CredentialAuthority::new(MemoryUserStore::new());
        block_on(authority.issue(&sign_up("alice@example.com", "pw"))).unwrap();

        let duplicate = block_on(authority.issue(&sign_up("alice@example.com", "pw2"))).unwrap_err();
        assert!(matches!(duplicate, AppError::Validation(_)));

        let mut missing = sign_up("bob@example.com", "pw");
        missing.username = None;
        let err = block_on(authority.issue(&missing)).unwrap_err();
        assert_eq!(err.to_string(), "Missing username");

        let err = block_on(authority.issue(&sign_up("not-an-email", "pw"))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn issue_surfaces_storage_failures() {
        let store = MemoryUserStore::new();
        store.fail_writes();
        let authority = CredentialAuthority::new(store);
        let err = block_on(authority.issue(&sign_up("alice@example.com", "pw"))).unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[test]
    fn password_failures_are_indistinguishable() {
        let authority = CredentialAuthority::new(MemoryUserStore::new());
        let issued = block_on(authority.issue(&sign_up("alice@example.com", "pw"))).unwrap();

        let ok = block_on(authority.verify_password("alice@example.com", "pw")).unwrap();
        assert_eq!(ok.id, issued.id);
        assert_eq!(ok.token, issued.token);

        let wrong_password =
            block_on(authority.verify_password("alice@example.com", "nope")).unwrap_err();
        let unknown_user = block_on(authority.verify_password("bob@example.com", "pw")).unwrap_err();

        assert_eq!(wrong_password.status_code(), unknown_user.status_code());
        assert_eq!(wrong_password.error_body(), unknown_user.error_body());
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[test]
    fn bearer_verification_requires_issued_token() {
        let authority = CredentialAuthority::new(MemoryUserStore::new());
        let issued = block_on(authority.issue(&sign_up("alice@example.com", "pw"))).unwrap();

        let owner = block_on(authority.verify(&Credential::Bearer {
            token: issued.token.clone(),
        }))
        .unwrap();
        assert_eq!(owner.id, issued.id);

        for token in ["", "never-issued", &issued.token[1..]] {
            let err = block_on(authority.verify(&Credential::Bearer {
                token: token.to_string(),
            }))
            .unwrap_err();
            assert!(matches!(err, AppError::Unauthorized));
        }
    }

    #[test]
    fn change_password_rotates_token() {
        let authority = CredentialAuthority::new(MemoryUserStore::new());
        let issued = block_on(authority.issue(&sign_up("alice@example.com", "pw"))).unwrap();

        let wrong = block_on(authority.change_password(
            &issued,
            &Some("bad".to_string()),
            &Some("pw2".to_string()),
        ))
        .unwrap_err();
        assert!(matches!(wrong, AppError::Unauthorized));

        let rotated = block_on(authority.change_password(
            &issued,
            &Some("pw".to_string()),
            &Some("pw2".to_string()),
        ))
        .unwrap();
        assert_ne!(rotated.token, issued.token);

        assert!(block_on(authority.verify_bearer(&issued.token)).is_err());
        assert_eq!(
            block_on(authority.verify_bearer(&rotated.token)).unwrap().id,
            issued.id
        );
        assert!(block_on(authority.verify_password("alice@example.com", "pw")).is_err());
        let login = block_on(authority.verify(&Credential::Password {
            identifier: "alice@example.com".to_string(),
            password: "pw2".to_string(),
        }))
        .unwrap();
        assert_eq!(login.token, rotated.token);
    }
}
