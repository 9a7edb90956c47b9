//! # Utility Functions
//!
//! This module provides utility functions used throughout the profile service.
//!
//! ## Core Utilities
//!
//! - **Namespaces**: Per-user storage prefixes isolating uploaded objects
//! - **Identifiers**: Random object keys and request identifiers
//! - **CORS Headers**: Consistent cross-origin request support
//!
//! ## Object Organization
//!
//! Every uploaded picture is stored at:
//!
//! ```text
//! {folder}/{userId}/{objectKey}
//! ```
//!
//! `objectKey` is a fresh random name, so two uploads never collide and the
//! client-supplied file name never reaches the storage path.

use chrono::Utc;
use uuid::Uuid;
use worker::Headers;

use crate::auth::token::random_alphanumeric;
use crate::constants::{
    CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS, CORS_ALLOW_ORIGIN, OBJECT_KEY_LENGTH,
};

/// Builds the storage namespace owned by one user.
///
/// # Example
///
/// ```rust,ignore
/// let ns = user_namespace("airbnb", "5f0c..");
/// // Returns: "airbnb/5f0c.."
/// ```
pub fn user_namespace(folder: &str, user_id: &str) -> String {
    format!(
        "{}/{}",
        sanitize_path_component(folder),
        sanitize_path_component(user_id)
    )
}

/// Sanitizes a path component to prevent path traversal and characters that
/// are problematic in storage systems.
fn sanitize_path_component(component: &str) -> String {
    let safe = component
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect::<String>()
        .to_lowercase();

    if safe.is_empty() {
        "unknown".to_string()
    } else {
        safe
    }
}

/// Draws the random object name for one upload job.
pub fn generate_object_key() -> String {
    random_alphanumeric(OBJECT_KEY_LENGTH)
}

/// Generates a request identifier in the format `{timestamp}-{uuid}`.
///
/// The timestamp prefix keeps log lines sortable by arrival time.
pub fn generate_request_id() -> String {
    let uuid_part = Uuid::new_v4().to_string();
    let timestamp = Utc::now().timestamp_millis();
    format!("{}-{}", timestamp, uuid_part)
}

/// Creates HTTP headers for Cross-Origin Resource Sharing (CORS) support.
///
/// - **Access-Control-Allow-Origin**: `*`
/// - **Access-Control-Allow-Methods**: `GET, POST, OPTIONS`
/// - **Access-Control-Allow-Headers**: `Content-Type, Authorization`
pub fn cors_headers() -> Headers {
    let headers = Headers::new();
    // Note: These values are known to be valid
    let _ = headers.set("Access-Control-Allow-Origin", CORS_ALLOW_ORIGIN);
    let _ = headers.set("Access-Control-Allow-Methods", CORS_ALLOW_METHODS);
    let _ = headers.set("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS);
    headers
}
