//! Avoidable emergency-department visit prediction.
//!
//! A pre-trained binary classifier served behind `POST /predict`, plus the
//! form client that builds its requests.
//!
//! ```text
//!  ed-form ──JSON──▶ /predict ──▶ SchemaVariant::frame ──▶ Classifier
//!     ▲                                                        │
//!     └──────────── {prediction, probability} ◀────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod models;
pub mod schema;

pub use error::{PredictError, PredictResult};
pub use handlers::AppState;
pub use inference::{Classifier, ModelCard, ModelError, OnnxClassifier};
pub use models::{BodySystem, PredictionRecord, PredictionResponse, Verdict};
pub use schema::{FeatureFrame, FeatureValue, SchemaVariant};
