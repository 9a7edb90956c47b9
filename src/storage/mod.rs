//! # Object Storage
//!
//! [`ObjectStore`] is the `StoreObject` capability used by the upload
//! coordinator: one call stores one job's bytes under `namespace/key` and
//! returns the public location of the created object.
//!
//! Jobs of one batch share a [`ObjectStore::Batch`] scope. Dropping a job's
//! future only stops polling it; the remote request keeps running until the
//! scope is passed to [`ObjectStore::abort_batch`].

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::models::UploadJob;

pub mod cloudinary;

pub use cloudinary::CloudinaryStore;

#[async_trait(?Send)]
pub trait ObjectStore {
    /// Cancellation scope shared by every job of one batch.
    type Batch;

    fn open_batch(&self) -> Self::Batch;

    async fn store(&self, job: &UploadJob, batch: &Self::Batch) -> AppResult<String>;

    /// Aborts the requests of `batch` still running on the remote side.
    fn abort_batch(&self, batch: Self::Batch);
}
