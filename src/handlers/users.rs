//! # User Handlers
//!
//! Registration, login, password change and profile lookup.
//!
//! - `POST /sign_up`          - Register and receive a bearer token
//! - `POST /log_in`           - Exchange email and password for the token
//! - `POST /change_password`  - Rotate password and token (bearer)
//! - `GET  /{id}`             - Fetch a public profile (bearer)

use worker::*;

use crate::config::Config;
use crate::errors::AppResult;
use crate::logging::Logger;
use crate::middleware::BearerAuth;
use crate::models::{
    ChangePasswordRequest, LogInRequest, ProfileResponse, SessionResponse, SignUpRequest,
};

use super::{account_service, json_body, respond};

async fn register(req: &mut Request, env: &Env, config: &Config, logger: &Logger) -> AppResult<SessionResponse> {
    let body: SignUpRequest = json_body(req).await?;
    account_service(env, config, logger)?.sign_up(&body).await
}

async fn authenticate(req: &mut Request, env: &Env, config: &Config, logger: &Logger) -> AppResult<SessionResponse> {
    let body: LogInRequest = json_body(req).await?;
    account_service(env, config, logger)?.log_in(&body).await
}

async fn rotate(req: &mut Request, env: &Env, config: &Config, logger: &Logger) -> AppResult<SessionResponse> {
    let token = BearerAuth::from_request(req)?;
    let body: ChangePasswordRequest = json_body(req).await?;
    account_service(env, config, logger)?
        .change_password(token, &body)
        .await
}

async fn lookup(req: &Request, id: &str, env: &Env, config: &Config, logger: &Logger) -> AppResult<ProfileResponse> {
    let token = BearerAuth::from_request(req)?;
    account_service(env, config, logger)?
        .get_profile(token, id)
        .await
}

pub async fn sign_up(mut req: Request, env: &Env, config: &Config, logger: &Logger) -> Result<Response> {
    respond(register(&mut req, env, config, logger).await, logger)
}

pub async fn log_in(mut req: Request, env: &Env, config: &Config, logger: &Logger) -> Result<Response> {
    respond(authenticate(&mut req, env, config, logger).await, logger)
}

pub async fn change_password(mut req: Request, env: &Env, config: &Config, logger: &Logger) -> Result<Response> {
    respond(rotate(&mut req, env, config, logger).await, logger)
}

pub async fn get_profile(req: Request, id: &str, env: &Env, config: &Config, logger: &Logger) -> Result<Response> {
    respond(lookup(&req, id, env, config, logger).await, logger)
}
