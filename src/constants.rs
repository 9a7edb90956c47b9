//! # Application Constants
//!
//! This module defines application-wide constants used throughout the profile
//! service. Binding names must match the `wrangler.toml` configuration.
//!
//! ## Binding Names
//!
//! Constants for Cloudflare Worker bindings and secrets.
//!
//! ## Limits
//!
//! Default upload limits and credential parameters.
//!
//! ## Headers
//!
//! Standard HTTP header names used by the API.

/// Standard KV configuration binding name
pub const STORAGE_CONFIG_KV_NAME: &str = "STORAGE_CONFIG";

/// Standard D1 database binding name for user records
pub const USERS_DB_NAME: &str = "USERS_DB";

/// Worker variable holding the object storage cloud name
pub const CLOUD_NAME_ENV: &str = "CLOUDINARY_CLOUD_NAME";

/// Worker secret holding the object storage API key
pub const API_KEY_ENV: &str = "CLOUDINARY_API_KEY";

/// Worker secret holding the object storage API secret
pub const API_SECRET_ENV: &str = "CLOUDINARY_API_SECRET";

/// Default folder under which every user namespace is created
pub const DEFAULT_UPLOAD_FOLDER: &str = "airbnb";

/// Default upper bound for a single object upload (30 seconds)
pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 30_000;

/// Default maximum picture size (10MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10_485_760;

/// Default maximum number of pictures accepted in one batch
pub const DEFAULT_MAX_FILES_PER_BATCH: usize = 20;

/// Multipart field carrying uploaded pictures
pub const PICTURE_FIELD: &str = "picture";

/// Length of bearer tokens issued to subjects
pub const TOKEN_LENGTH: usize = 32;

/// Length of the random object name drawn for each uploaded picture
pub const OBJECT_KEY_LENGTH: usize = 16;

/// PBKDF2 iteration count for password hashes
pub const PASSWORD_HASH_ROUNDS: u32 = 25_000;

/// Salt length in bytes for password hashes
pub const PASSWORD_SALT_LENGTH: usize = 16;

/// Derived key length in bytes for password hashes
pub const PASSWORD_HASH_LENGTH: usize = 32;

/// Fixed message returned for every authentication failure
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// HTTP header carrying the bearer token
pub const HEADER_AUTHORIZATION: &str = "Authorization";

/// CORS header for allowed origins
pub const CORS_ALLOW_ORIGIN: &str = "*";

/// CORS header for allowed methods
pub const CORS_ALLOW_METHODS: &str = "GET, POST, OPTIONS";

/// CORS header for allowed headers
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization";
