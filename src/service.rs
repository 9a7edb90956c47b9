//! # Account Service
//!
//! Sequences the request pipeline for every API operation:
//!
//! ```text
//! caller → CredentialAuthority (verify) → UploadCoordinator (fan-out/fan-in)
//!        → profile association (append locations to the subject)
//! ```
//!
//! The authenticated [`Subject`] and the batch results are passed between the
//! stages as plain values. Handlers only translate HTTP to and from these
//! calls.
//!
//! ## Limitations
//!
//! Uploads and the profile write are not atomic together. If the profile write
//! fails after a successful batch, the stored objects are left orphaned.

use crate::auth::CredentialAuthority;
use crate::config::Settings;
use crate::coordinator::{plan_jobs, UploadCoordinator};
use crate::errors::{AppError, AppResult};
use crate::log_data;
use crate::logging::Logger;
use crate::middleware::ValidationMiddleware;
use crate::models::{
    ChangePasswordRequest, Credential, IncomingFile, LogInRequest, ProfileResponse,
    SessionResponse, SignUpRequest, Subject,
};
use crate::storage::ObjectStore;
use crate::store::UserStore;
use crate::utils::user_namespace;

pub struct AccountService<S, O> {
    authority: CredentialAuthority<S>,
    coordinator: UploadCoordinator<O>,
    settings: Settings,
    logger: Logger,
}

impl<S: UserStore, O: ObjectStore> AccountService<S, O> {
    pub fn new(users: S, objects: O, settings: Settings, logger: Logger) -> Self {
        Self {
            authority: CredentialAuthority::new(users),
            coordinator: UploadCoordinator::new(objects, settings.upload_timeout(), logger.clone()),
            settings,
            logger,
        }
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> AppResult<SessionResponse> {
        let subject = self.authority.issue(request).await?;
        self.logger
            .info("Subject registered", log_data!("user_id" => subject.id));
        Ok(subject.into())
    }

    pub async fn log_in(&self, request: &LogInRequest) -> AppResult<SessionResponse> {
        let credential = Credential::Password {
            identifier: ValidationMiddleware::require_field(&request.email, "email")?.to_string(),
            password: ValidationMiddleware::require_secret(&request.password, "password")?
                .to_string(),
        };
        let subject = self.authority.verify(&credential).await?;
        Ok(subject.into())
    }

    pub async fn authenticate(&self, token: String) -> AppResult<Subject> {
        self.authority.verify(&Credential::Bearer { token }).await
    }

    /// Uploads `files` for an authenticated subject and appends their locations
    /// to the profile. Returns the locations of this batch only.
    pub async fn upload_for(
        &self,
        subject: &Subject,
        files: Vec<IncomingFile>,
    ) -> AppResult<Vec<String>> {
        ValidationMiddleware::validate_batch(
            &files,
            self.settings.max_files_per_batch,
            self.settings.max_file_size,
        )?;

        let namespace = user_namespace(&self.settings.upload_folder, &subject.id);
        let jobs = plan_jobs(&namespace, files);
        let results = self.coordinator.run_batch(jobs).await?;
        let locations: Vec<String> = results.into_iter().map(|r| r.location).collect();

        if !locations.is_empty() {
            if let Err(error) = self.authority.store().append_photos(&subject.id, &locations).await {
                self.logger.error(
                    "Profile update failed after upload",
                    log_data!(
                        "user_id" => subject.id,
                        "orphaned" => locations,
                        "error" => error.to_string()
                    ),
                );
                return Err(error);
            }
        }

        Ok(locations)
    }

    pub async fn change_password(
        &self,
        token: String,
        request: &ChangePasswordRequest,
    ) -> AppResult<SessionResponse> {
        let subject = self.authenticate(token).await?;
        let rotated = self
            .authority
            .change_password(&subject, &request.password, &request.new_password)
            .await?;
        self.logger
            .info("Credentials rotated", log_data!("user_id" => rotated.id));
        Ok(rotated.into())
    }

    pub async fn get_profile(&self, token: String, id: &str) -> AppResult<ProfileResponse> {
        self.authenticate(token).await?;

        let record = self
            .authority
            .store()
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(ProfileResponse {
            id: record.id,
            account: record.profile,
        })
    }
}
