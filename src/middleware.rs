//! # Middleware Components
//!
//! This module provides middleware components for request/response processing
//! in the profile service. Middleware components handle cross-cutting
//! concerns such as CORS, input validation and bearer token extraction.
//!
//! ## Middleware Types
//!
//! - **CORS Middleware**: Handles cross-origin request support
//! - **Validation Middleware**: Validates request fields and uploaded files
//! - **Bearer Auth**: Extracts the bearer token from the `Authorization` header
//!
//! ## Usage Examples
//!
//! ```rust,ignore
//! // Handle CORS preflight
//! if req.method() == Method::Options {
//!     return CorsMiddleware::handle_preflight();
//! }
//!
//! // Extract the caller's token
//! let token = BearerAuth::from_request(&req)?;
//! ```

use crate::constants::{
    CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS, CORS_ALLOW_ORIGIN, HEADER_AUTHORIZATION,
};
use crate::errors::{AppError, AppResult};
use crate::models::IncomingFile;
use crate::utils::cors_headers;
use worker::*;

/// Middleware for handling Cross-Origin Resource Sharing (CORS) requests.
///
/// # Security Considerations
///
/// The current implementation allows all origins (`*`). Bearer tokens travel in
/// the `Authorization` header, never in cookies, so no credentials are sent
/// implicitly by browsers.
pub struct CorsMiddleware;

impl CorsMiddleware {
    /// Adds CORS headers to an existing response, keeping the headers it
    /// already carries (such as `Content-Type`).
    pub fn apply_headers(mut response: Response) -> Result<Response> {
        let headers = response.headers_mut();
        headers.set("Access-Control-Allow-Origin", CORS_ALLOW_ORIGIN)?;
        headers.set("Access-Control-Allow-Methods", CORS_ALLOW_METHODS)?;
        headers.set("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS)?;
        Ok(response)
    }

    /// Handles CORS preflight requests (OPTIONS method).
    ///
    /// Browsers send preflight requests for:
    /// - Requests carrying the `Authorization` header
    /// - Non-simple content types such as `application/json`
    pub fn handle_preflight() -> Result<Response> {
        Ok(Response::empty()?.with_headers(cors_headers()))
    }
}

/// Middleware for validating request fields and uploaded files.
///
/// All validation methods return `AppResult<T>` and fail with
/// `AppError::Validation`, which handlers render as 400 responses.
pub struct ValidationMiddleware;

impl ValidationMiddleware {
    /// Returns the trimmed value of a required text field.
    ///
    /// # Errors
    ///
    /// - `Validation("Missing <field>")`: absent or blank value
    pub fn require_field<'a>(value: &'a Option<String>, field: &str) -> AppResult<&'a str> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::validation(format!("Missing {field}")))
    }

    /// Like [`require_field`](Self::require_field) but keeps surrounding
    /// whitespace, which is significant in passwords.
    pub fn require_secret<'a>(value: &'a Option<String>, field: &str) -> AppResult<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::validation(format!("Missing {field}")))
    }

    /// Rejects values that cannot be an email address.
    pub fn validate_email(email: &str) -> AppResult<()> {
        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !email.chars().any(char::is_whitespace)
            }
            None => false,
        };
        if valid {
            Ok(())
        } else {
            Err(AppError::validation(format!("Invalid email: {email}")))
        }
    }

    /// Validates that a picture size is within configured limits.
    pub fn validate_file_size(size: u64, max_size: u64) -> AppResult<()> {
        if size > max_size {
            return Err(AppError::validation(format!(
                "File size {size} exceeds maximum allowed size {max_size}"
            )));
        }
        Ok(())
    }

    /// Only pictures are accepted. The check relies on the client-provided
    /// MIME type.
    pub fn validate_content_type(content_type: &str) -> AppResult<()> {
        if !content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(AppError::validation(format!(
                "Unsupported file type: {content_type}"
            )));
        }
        Ok(())
    }

    /// Validates a whole batch before any upload is dispatched.
    pub fn validate_batch(files: &[IncomingFile], max_files: usize, max_size: u64) -> AppResult<()> {
        if files.len() > max_files {
            return Err(AppError::validation(format!(
                "Too many files: {} (maximum {max_files})",
                files.len()
            )));
        }
        for file in files {
            Self::validate_content_type(&file.content_type)
                .and_then(|_| Self::validate_file_size(file.size(), max_size))
                .map_err(|e| AppError::validation(format!("{}: {e}", file.file_name)))?;
        }
        Ok(())
    }
}

/// Bearer token extraction.
pub struct BearerAuth;

impl BearerAuth {
    /// Per RFC 6750 the "Bearer" scheme is case-insensitive. A missing or
    /// malformed header is an authentication failure, not a validation one.
    pub fn parse(header: Option<&str>) -> AppResult<String> {
        header
            .map(str::trim)
            .and_then(|v| {
                v.get(..7)
                    .filter(|scheme| scheme.eq_ignore_ascii_case("bearer "))
                    .map(|_| v[7..].trim())
            })
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or(AppError::Unauthorized)
    }

    pub fn from_request(req: &Request) -> AppResult<String> {
        let header = req.headers().get(HEADER_AUTHORIZATION)?;
        Self::parse(header.as_deref())
    }
}
