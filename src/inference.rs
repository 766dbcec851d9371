//! Model seam.
//!
//! The pre-trained pipeline is an opaque artifact with `predict` and
//! `predict_proba`. [`OnnxClassifier`] runs an ONNX export of it with tract;
//! anything else implementing [`Classifier`] can be served the same way.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tract_onnx::prelude::*;

use crate::schema::{FeatureFrame, SchemaError, SchemaVariant};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load model {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("invalid model card: {0}")]
    Card(String),

    #[error(transparent)]
    Frame(#[from] SchemaError),

    #[error("inference failed: {0}")]
    Run(String),

    #[error("unexpected model output: {0}")]
    Output(String),
}

/// A loaded binary classifier. Shared read-only across workers.
pub trait Classifier: Send + Sync {
    /// Predicted class label.
    fn predict(&self, frame: &FeatureFrame) -> Result<i64, ModelError>;

    /// `[P(class 0), P(class 1)]`.
    fn predict_proba(&self, frame: &FeatureFrame) -> Result<[f64; 2], ModelError>;

    fn describe(&self) -> String;
}

fn default_positive_index() -> usize {
    1
}

fn default_threshold() -> f64 {
    0.5
}

/// Sidecar describing how to feed the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCard {
    /// Input columns in the order the artifact expects them.
    pub feature_names: Vec<String>,

    /// Column of the probability output holding the positive class.
    #[serde(default = "default_positive_index")]
    pub positive_index: usize,

    /// Used for `predict` when the artifact has no label output.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl ModelCard {
    pub fn for_variant(variant: SchemaVariant) -> Self {
        Self {
            feature_names: variant.columns().into_iter().map(str::to_string).collect(),
            positive_index: default_positive_index(),
            threshold: default_threshold(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| ModelError::Card(format!("{}: {}", path.display(), e)))?;
        let card: ModelCard =
            serde_json::from_str(&raw).map_err(|e| ModelError::Card(format!("{}: {}", path.display(), e)))?;
        card.validate()?;
        Ok(card)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names.is_empty() {
            return Err(ModelError::Card("feature_names is empty".into()));
        }
        if self.positive_index > 1 {
            return Err(ModelError::Card(format!(
                "positive_index must be 0 or 1, got {}",
                self.positive_index
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ModelError::Card(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    /// Card columns the given schema variant never produces.
    pub fn unknown_columns(&self, variant: SchemaVariant) -> Vec<&str> {
        let known = variant.columns();
        self.feature_names
            .iter()
            .map(String::as_str)
            .filter(|name| !known.contains(name))
            .collect()
    }
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// ONNX export of the pipeline, loaded once at startup.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    card: ModelCard,
    path: String,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(path: P, card: ModelCard) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let load_err = |reason: String| ModelError::Load { path: display.clone(), reason };

        card.validate()?;
        if !path.exists() {
            return Err(load_err("file not found".into()));
        }

        let width = card.feature_names.len();
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| {
                log::error!("Failed to load ONNX model: {}", e);
                load_err(e.to_string())
            })?
            .with_input_fact(0, f32::fact([1, width]).into())
            .map_err(|e| load_err(format!("input shape [1, {width}] rejected: {e}")))?
            .into_optimized()
            .map_err(|e| {
                log::error!("Failed to optimize ONNX model: {}", e);
                load_err(e.to_string())
            })?
            .into_runnable()
            .map_err(|e| {
                log::error!("Failed to make model runnable: {}", e);
                load_err(e.to_string())
            })?;

        log::info!("Loaded model {} with {} input features", display, width);

        Ok(Self { plan, card, path: display })
    }

    fn run(&self, frame: &FeatureFrame) -> Result<TVec<TValue>, ModelError> {
        let row = frame.to_row(self.card.feature_names.as_slice())?;
        let shape = row.dim();
        let tensor = tract_ndarray::Array2::from_shape_vec(shape, row.into_raw_vec())
            .map_err(|e| ModelError::Run(e.to_string()))?
            .into_tensor();

        self.plan.run(tvec!(tensor.into())).map_err(|e| {
            log::error!("Model inference failed: {}", e);
            ModelError::Run(e.to_string())
        })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, frame: &FeatureFrame) -> Result<i64, ModelError> {
        let outputs = self.run(frame)?;
        if let Some(label) = read_label(&outputs) {
            return Ok(label);
        }
        let [_, positive] = read_probabilities(&outputs, self.card.positive_index)?;
        Ok(i64::from(positive >= self.card.threshold))
    }

    fn predict_proba(&self, frame: &FeatureFrame) -> Result<[f64; 2], ModelError> {
        let outputs = self.run(frame)?;
        read_probabilities(&outputs, self.card.positive_index)
    }

    fn describe(&self) -> String {
        format!("onnx:{}", self.path)
    }
}

/// First `i64` output, as emitted by sklearn classifier exports.
pub fn read_label(outputs: &[TValue]) -> Option<i64> {
    outputs
        .iter()
        .filter(|o| o.datum_type() == DatumType::I64)
        .find_map(|o| o.as_slice::<i64>().ok().and_then(|s| s.first().copied()))
}

/// First float output with one or two values per row.
pub fn read_probabilities(outputs: &[TValue], positive_index: usize) -> Result<[f64; 2], ModelError> {
    for output in outputs {
        let values: Vec<f64> = match output.datum_type() {
            DatumType::F32 => match output.as_slice::<f32>() {
                Ok(s) => s.iter().map(|v| f64::from(*v)).collect(),
                Err(_) => continue,
            },
            DatumType::F64 => match output.as_slice::<f64>() {
                Ok(s) => s.to_vec(),
                Err(_) => continue,
            },
            _ => continue,
        };

        let positive = match values.len() {
            1 => values[0],
            2 => values[positive_index.min(1)],
            _ => continue,
        };
        if !positive.is_finite() {
            return Err(ModelError::Output(format!("non-finite probability {positive}")));
        }
        let positive = positive.clamp(0.0, 1.0);
        return Ok([1.0 - positive, positive]);
    }

    Err(ModelError::Output("no probability output found".into()))
}
