use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{PredictError, PredictResult};
use crate::inference::{Classifier, ModelError};
use crate::models::PredictionResponse;
use crate::schema::SchemaVariant;

pub const ROOT_MESSAGE: &str = "Avoidable ED Prediction API";

/// Shared by every worker; the classifier is read-only after startup.
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub variant: SchemaVariant,
}

impl AppState {
    pub fn new(classifier: Arc<dyn Classifier>, variant: SchemaVariant) -> Self {
        Self { classifier, variant }
    }
}

/// Registers `/` and `/predict`. Body parse failures go through
/// [`PredictError`] so they surface as 500s like every other failure.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| PredictError::Payload(err.to_string()).into()),
    )
    .service(web::resource("/").route(web::get().to(root)))
    .service(web::resource("/predict").route(web::post().to(predict)));
}

pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": ROOT_MESSAGE }))
}

pub async fn predict(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> PredictResult<HttpResponse> {
    let request_id = Uuid::new_v4();
    let frame = state.variant.frame(&body)?;
    log::info!("[{}] Received input: {}", request_id, frame);

    let classifier = Arc::clone(&state.classifier);
    let response = web::block(move || -> Result<PredictionResponse, ModelError> {
        let prediction = classifier.predict(&frame)?;
        let [_, probability] = classifier.predict_proba(&frame)?;
        Ok(PredictionResponse { prediction, probability })
    })
    .await??;

    log::info!(
        "[{}] Prediction: {} Probability: {}",
        request_id,
        response.prediction,
        response.probability
    );

    Ok(HttpResponse::Ok().json(response))
}
