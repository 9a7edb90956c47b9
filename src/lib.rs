//! # Staybook Users - Cloudflare Workers
//!
//! User registration, bearer-token authentication and batch profile-picture
//! uploads, built with Rust and Cloudflare Workers. Users live in a D1
//! database; pictures are stored in Cloudinary under a per-user namespace.
//!
//! ## Architecture
//!
//! - **Router**: Routes incoming requests to appropriate handlers
//! - **Handlers**: Translate HTTP to service calls and render one response
//! - **Service**: Sequences authentication, upload batch and profile update
//! - **Auth**: Credential authority issuing, verifying and rotating tokens
//! - **Coordinator**: Concurrent upload fan-out with single-outcome fan-in
//! - **Store / Storage**: D1 user records and the object storage capability
//! - **Middleware**: CORS, validation and bearer token extraction
//!
//! ## Example Usage
//!
//! ```text
//! POST /sign_up          - Register, returns { _id, token, account }
//! POST /log_in           - Login, returns { _id, token, account }
//! POST /upload_picture   - Upload pictures (Authorization: Bearer <token>)
//! POST /change_password  - Rotate password and token
//! GET  /{id}             - Public profile of a user
//! ```

use std::sync::{Arc, OnceLock};
use worker::*;

mod auth;
mod config;
mod constants;
mod coordinator;
mod errors;
mod handlers;
mod logging;
mod middleware;
mod models;
mod router;
mod service;
mod storage;
mod store;
mod utils;

use config::Config;
use constants::STORAGE_CONFIG_KV_NAME;
use errors::AppResult;
use logging::Logger;

static CONFIG_CACHE: OnceLock<Arc<Config>> = OnceLock::new();

/// Main entry point for the Cloudflare Worker.
///
/// 1. Sets up panic handling for better debugging
/// 2. Loads configuration once per isolate; missing storage credentials
///    fail every request with a configuration error until fixed
/// 3. Delegates request routing to the router module
#[event(fetch)]
pub async fn main(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    // Set up panic hook for better error reporting in development
    console_error_panic_hook::set_once();

    let logger = Logger::new(utils::generate_request_id());

    let config = match load_config(&env).await {
        Ok(config) => config,
        Err(error) => return handlers::respond::<()>(Err(error), &logger),
    };

    router::handle_request(req, env, &config, &logger).await
}

async fn load_config(env: &Env) -> AppResult<Arc<Config>> {
    if let Some(config) = CONFIG_CACHE.get() {
        return Ok(config.clone());
    }

    let kv = env.kv(STORAGE_CONFIG_KV_NAME)?;
    let config = Arc::new(Config::load(&kv, env).await?);
    let _ = CONFIG_CACHE.set(config.clone());
    Ok(config)
}
