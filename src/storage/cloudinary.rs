//! Signed uploads to the Cloudinary image API.
//!
//! Each picture is posted as a base64 data URI together with its `public_id`
//! (`namespace/key`) and a SHA-256 signature over the sorted signed parameters.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use worker::wasm_bindgen::JsValue;
use worker::{AbortController, Fetch, Headers, Method, Request, RequestInit};

use crate::config::StorageCredentials;
use crate::errors::{AppError, AppResult};
use crate::models::UploadJob;
use crate::storage::ObjectStore;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Deserialize)]
struct UploadReply {
    secure_url: Option<String>,
    error: Option<ReplyError>,
}

#[derive(Deserialize)]
struct ReplyError {
    message: String,
}

pub struct CloudinaryStore {
    credentials: StorageCredentials,
}

impl CloudinaryStore {
    pub fn new(credentials: StorageCredentials) -> Self {
        Self { credentials }
    }

    fn upload_url(&self) -> String {
        format!("{API_BASE}/{}/image/upload", self.credentials.cloud_name)
    }

    fn request_body(&self, job: &UploadJob, timestamp: i64) -> serde_json::Value {
        let public_id = job.object_path();
        let stamp = timestamp.to_string();
        let signature = sign(
            &[("public_id", public_id.as_str()), ("timestamp", stamp.as_str())],
            &self.credentials.api_secret,
        );
        json!({
            "file": data_uri(&job.source.content_type, &job.source.bytes),
            "public_id": public_id,
            "timestamp": timestamp,
            "api_key": self.credentials.api_key,
            "signature": signature,
            "signature_algorithm": "sha256",
        })
    }
}

/// Signs request parameters: `k1=v1&k2=v2` sorted by key, followed by the
/// API secret, hashed with SHA-256 and hex encoded.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{joined}{api_secret}").as_bytes()))
}

fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{content_type};base64,{}", BASE64.encode(bytes))
}

#[async_trait(?Send)]
impl ObjectStore for CloudinaryStore {
    type Batch = AbortController;

    fn open_batch(&self) -> AbortController {
        AbortController::default()
    }

    async fn store(&self, job: &UploadJob, batch: &AbortController) -> AppResult<String> {
        let body = self.request_body(job, Utc::now().timestamp());

        let headers = Headers::new();
        headers.set("Content-Type", "application/json")?;
        let mut init = RequestInit::new();
        init.with_method(Method::Post)
            .with_headers(headers)
            .with_body(Some(JsValue::from_str(&body.to_string())));

        let request = Request::new_with_init(&self.upload_url(), &init)?;
        let mut response = Fetch::Request(request)
            .send_with_signal(&batch.signal())
            .await?;
        let status = response.status_code();
        let reply: UploadReply = response.json().await?;

        match (reply.secure_url, reply.error) {
            (Some(url), None) if (200..300).contains(&status) => Ok(url),
            (_, Some(error)) => Err(AppError::storage(error.message)),
            _ => Err(AppError::storage(format!(
                "object storage answered {status} without a location"
            ))),
        }
    }

    fn abort_batch(&self, batch: AbortController) {
        batch.abort();
    }
}
