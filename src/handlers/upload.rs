//! # Upload Handler
//!
//! `POST /upload_picture` accepts `multipart/form-data` with one or more files
//! under the `picture` field. The caller is authenticated before any file is
//! read from the request body.

use worker::*;

use crate::config::Config;
use crate::constants::PICTURE_FIELD;
use crate::errors::{AppError, AppResult};
use crate::logging::Logger;
use crate::middleware::BearerAuth;
use crate::models::IncomingFile;

use super::{account_service, respond};

async fn read_pictures(req: &mut Request) -> AppResult<Vec<IncomingFile>> {
    let form = req
        .form_data()
        .await
        .map_err(|_| AppError::validation("Expected multipart/form-data"))?;

    let mut files = Vec::new();
    for entry in form.get_all(PICTURE_FIELD).unwrap_or_default() {
        match entry {
            FormEntry::File(file) => files.push(IncomingFile {
                file_name: file.name(),
                content_type: file.type_(),
                bytes: file.bytes().await?,
            }),
            FormEntry::Field(_) => {
                return Err(AppError::validation(format!(
                    "Field {PICTURE_FIELD} must contain files"
                )))
            }
        }
    }
    Ok(files)
}

async fn upload(req: &mut Request, env: &Env, config: &Config, logger: &Logger) -> AppResult<Vec<String>> {
    let token = BearerAuth::from_request(req)?;
    let service = account_service(env, config, logger)?;
    let subject = service.authenticate(token).await?;

    let files = read_pictures(req).await?;
    service.upload_for(&subject, files).await
}

pub async fn upload_picture(mut req: Request, env: &Env, config: &Config, logger: &Logger) -> Result<Response> {
    respond(upload(&mut req, env, config, logger).await, logger)
}
