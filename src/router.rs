//! # Request Routing and Dispatch
//!
//! This module handles HTTP request routing for the profile service. It
//! dispatches requests to handlers based on HTTP method and URL path.
//!
//! ## Supported Routes
//!
//! - `GET /health` - Health check endpoint
//! - `POST /sign_up` - Registration
//! - `POST /log_in` - Password login
//! - `POST /upload_picture` - Batch picture upload (bearer)
//! - `POST /change_password` - Password and token rotation (bearer)
//! - `GET /{id}` - Profile lookup (bearer)
//! - `OPTIONS *` - CORS preflight requests

use worker::*;

use crate::config::Config;
use crate::handlers::{handle_health_check, handle_not_found, upload, users};
use crate::logging::Logger;
use crate::middleware::CorsMiddleware;

/// Returns the id of a `/{id}` profile path.
fn profile_id(path: &str) -> Option<&str> {
    path.strip_prefix('/')
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
}

/// Handles incoming HTTP requests and routes them to appropriate handlers.
///
/// # Request Flow
///
/// 1. **CORS Preflight**: Handles OPTIONS requests for cross-origin support
/// 2. **Pattern Matching**: Matches method and path against known routes
/// 3. **Handler Dispatch**: Delegates to the handler, which renders one response
/// 4. **Fallback**: Returns 404 for unmatched routes
pub async fn handle_request(req: Request, env: Env, config: &Config, logger: &Logger) -> Result<Response> {
    // Handle CORS preflight requests early to avoid unnecessary processing
    if req.method() == Method::Options {
        return CorsMiddleware::handle_preflight();
    }

    let url = req.url()?;
    let path = url.path();
    let method = req.method();

    logger.info(
        "Routing request",
        crate::log_data!("method" => method.to_string(), "path" => path),
    );

    match (method, path) {
        (Method::Get, "/health") => handle_health_check(req, env).await,
        (Method::Post, "/sign_up") => users::sign_up(req, &env, config, logger).await,
        (Method::Post, "/log_in") => users::log_in(req, &env, config, logger).await,
        (Method::Post, "/upload_picture") => upload::upload_picture(req, &env, config, logger).await,
        (Method::Post, "/change_password") => {
            users::change_password(req, &env, config, logger).await
        }
        (Method::Get, path) => match profile_id(path) {
            Some(id) => users::get_profile(req, id, &env, config, logger).await,
            None => handle_not_found(req, logger).await,
        },
        _ => handle_not_found(req, logger).await,
    }
}
