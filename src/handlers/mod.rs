//! # Handlers Module
//!
//! HTTP request handlers for the profile service. Handlers parse the Worker
//! request, call the [`AccountService`] and render its outcome. Every request
//! produces exactly one response: the success body or one JSON error body.

use serde::Serialize;
use worker::*;

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::log_data;
use crate::logging::Logger;
use crate::middleware::CorsMiddleware;
use crate::service::AccountService;
use crate::storage::CloudinaryStore;
use crate::store::D1UserStore;

pub mod upload;
pub mod users;

/// Response header echoing the request identifier used in log lines.
const HEADER_REQUEST_ID: &str = "X-Request-Id";

pub type WorkerAccountService = AccountService<D1UserStore, CloudinaryStore>;

/// Wires the service to the D1 binding and the object storage account.
pub fn account_service(env: &Env, config: &Config, logger: &Logger) -> AppResult<WorkerAccountService> {
    let db = env.d1(&config.settings.database_name)?;
    Ok(AccountService::new(
        D1UserStore::new(db),
        CloudinaryStore::new(config.storage.clone()),
        config.settings.clone(),
        logger.clone(),
    ))
}

/// Renders a service outcome as the single response for this request.
pub fn respond<T: Serialize>(result: AppResult<T>, logger: &Logger) -> Result<Response> {
    let response = match result {
        Ok(body) => Response::from_json(&body)?,
        Err(error) => {
            let data = log_data!("status" => error.status_code(), "error" => error.to_string());
            if error.status_code() >= 500 {
                logger.error("Request failed", data);
            } else {
                logger.warn("Request rejected", data);
            }
            error.to_response()?
        }
    };

    let mut response = CorsMiddleware::apply_headers(response)?;
    response
        .headers_mut()
        .set(HEADER_REQUEST_ID, logger.request_id())?;
    Ok(response)
}

/// Parses a JSON body, mapping malformed input to a validation error.
pub async fn json_body<T: serde::de::DeserializeOwned>(req: &mut Request) -> AppResult<T> {
    req.json::<T>()
        .await
        .map_err(|_| AppError::validation("Invalid JSON payload"))
}

/// Provides a health check endpoint for monitoring and load balancer probes.
///
/// # Response Format
///
/// ```json
/// {
///   "status": "healthy",
///   "service": "staybook-users-cf-workers",
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
pub async fn handle_health_check(_req: Request, _env: Env) -> Result<Response> {
    Response::from_json(&serde_json::json!({
        "status": "healthy",
        "service": "staybook-users-cf-workers",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Handles requests to unmatched routes with a 404 Not Found response.
pub async fn handle_not_found(_req: Request, logger: &Logger) -> Result<Response> {
    respond::<()>(Err(AppError::NotFound("Not Found".to_string())), logger)
}
