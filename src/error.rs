//! Error handling for the inference endpoint.
//!
//! Every failure while serving `/predict` becomes an HTTP 500 carrying a
//! `{"detail": ...}` body; nothing partial is ever returned.

use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::inference::ModelError;
use crate::schema::SchemaError;

pub type PredictResult<T> = Result<T, PredictError>;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("invalid request body: {0}")]
    Payload(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("inference worker failed")]
    Blocking(#[from] BlockingError),
}

impl PredictError {
    /// Message returned to the caller. Model internals stay in the log.
    pub fn detail(&self) -> String {
        match self {
            PredictError::Payload(_) | PredictError::Schema(_) => self.to_string(),
            PredictError::Model(_) | PredictError::Blocking(_) => "Prediction failed".to_string(),
        }
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        log::error!("Prediction error: {}", self);
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.detail() }))
    }
}
