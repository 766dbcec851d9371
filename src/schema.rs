//! Request schema for `/predict`.
//!
//! Turns a JSON body into the [`FeatureFrame`] the pre-trained pipeline
//! consumes: field extraction per [`SchemaVariant`], the one-hot body-system
//! check, categorical coercion, optional column renaming, and missing-value
//! fill.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, Axis};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::BodySystem;

/// Fill value for cells the request left empty.
pub const MISSING_SENTINEL: &str = "missing";

/// Columns the pipeline treats as categorical strings.
pub const CATEGORICAL_COLUMNS: [&str; 3] = ["SEX_IDENT_CD", "BENE_RACE_CD", "YEAR"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Categorical,
    Flag,
    Indicator(BodySystem),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const BASE_FIELDS: [FieldSpec; 6] = [
    FieldSpec { name: "AGE_AT_END_REF_YR", kind: FieldKind::Numeric },
    FieldSpec { name: "SEX_IDENT_CD", kind: FieldKind::Categorical },
    FieldSpec { name: "BENE_RACE_CD", kind: FieldKind::Categorical },
    FieldSpec { name: "YEAR", kind: FieldKind::Categorical },
    FieldSpec { name: "total_paid_amt", kind: FieldKind::Numeric },
    FieldSpec { name: "primary_dx_chronic_flag", kind: FieldKind::Flag },
];

/// All 29 request fields in pipeline order.
pub fn record_fields() -> impl Iterator<Item = FieldSpec> {
    BASE_FIELDS.into_iter().chain(BodySystem::PIPELINE_ORDER.into_iter().map(|b| FieldSpec {
        name: b.wire_key(),
        kind: FieldKind::Indicator(b),
    }))
}

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("field required: {0}")]
    MissingField(&'static str),

    #[error("field {0} may not be null")]
    NullField(&'static str),

    #[error("field {field} is not a valid number: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("indicator {field} must be 0 or 1, got {value}")]
    InvalidIndicator { field: &'static str, value: f64 },

    #[error("exactly one bodysystem indicator must be 1, found {0}")]
    OneHot(usize),

    #[error("model expects column {0} which the request did not provide")]
    UnknownColumn(String),
}

/// A single cell of the feature frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FeatureValue {
    /// Numeric view used when building the model input row.
    pub fn as_f32(&self) -> f32 {
        match self {
            FeatureValue::Number(n) => *n as f32,
            FeatureValue::Text(s) => s.trim().parse::<f32>().unwrap_or(f32::NAN),
            FeatureValue::Missing => f32::NAN,
        }
    }
}

/// One-row table of named features, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureFrame {
    columns: Vec<(&'static str, FeatureValue)>,
}

impl FeatureFrame {
    pub fn push(&mut self, column: &'static str, value: FeatureValue) {
        self.columns.push((column, value));
    }

    pub fn get(&self, column: &str) -> Option<&FeatureValue> {
        self.columns.iter().find(|(name, _)| *name == column).map(|(_, v)| v)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Builds a `[1, order.len()]` input row, picking columns by name.
    pub fn to_row<S: AsRef<str>>(&self, order: &[S]) -> Result<Array2<f32>, SchemaError> {
        let values = order
            .iter()
            .map(|name| {
                self.get(name.as_ref())
                    .map(FeatureValue::as_f32)
                    .ok_or_else(|| SchemaError::UnknownColumn(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<f32>, _>>()?;

        Ok(Array1::from_vec(values).insert_axis(Axis(0)))
    }

    fn values_mut(&mut self) -> impl Iterator<Item = (&'static str, &mut FeatureValue)> {
        self.columns.iter_mut().map(|(name, value)| (*name, value))
    }
}

impl Serialize for FeatureFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl fmt::Display for FeatureFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

/// The two request shapes the endpoint can be deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaVariant {
    /// Every field required, every value numeric (or a numeric string).
    #[default]
    Numeric,
    /// Every field optional with a default; body-system columns are renamed
    /// to the pipeline's capitalization.
    Defaulted,
}

impl FromStr for SchemaVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" => Ok(SchemaVariant::Numeric),
            "defaulted" => Ok(SchemaVariant::Defaulted),
            other => Err(format!("unknown schema variant: {other}")),
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVariant::Numeric => f.write_str("numeric"),
            SchemaVariant::Defaulted => f.write_str("defaulted"),
        }
    }
}

impl SchemaVariant {
    /// Frame column names in order, as the model sees them.
    pub fn columns(self) -> Vec<&'static str> {
        record_fields().map(|field| self.column_name(field)).collect()
    }

    fn column_name(self, field: FieldSpec) -> &'static str {
        match (self, field.kind) {
            (SchemaVariant::Defaulted, FieldKind::Indicator(b)) => b.pipeline_column(),
            _ => field.name,
        }
    }

    fn default_cell(field: FieldSpec) -> FeatureValue {
        match field.name {
            "AGE_AT_END_REF_YR" => FeatureValue::Number(65.0),
            "SEX_IDENT_CD" => FeatureValue::Text("1".to_string()),
            "BENE_RACE_CD" => FeatureValue::Text("0".to_string()),
            "YEAR" => FeatureValue::Text("2023".to_string()),
            _ => FeatureValue::Number(0.0),
        }
    }

    fn extract(self, body: &Map<String, Value>, field: FieldSpec) -> Result<FeatureValue, SchemaError> {
        let raw = match (self, body.get(field.name)) {
            (SchemaVariant::Numeric, None) => return Err(SchemaError::MissingField(field.name)),
            (SchemaVariant::Numeric, Some(Value::Null)) => return Err(SchemaError::NullField(field.name)),
            (SchemaVariant::Defaulted, None) => return Ok(Self::default_cell(field)),
            (SchemaVariant::Defaulted, Some(Value::Null)) => return Ok(FeatureValue::Missing),
            (_, Some(raw)) => raw,
        };

        match (self, field.kind, raw) {
            (SchemaVariant::Defaulted, FieldKind::Categorical, Value::String(s)) => {
                Ok(FeatureValue::Text(s.trim().to_string()))
            }
            (_, _, raw) => lenient_number(field.name, raw).map(FeatureValue::Number),
        }
    }

    /// Parses a request body into the frame handed to the classifier.
    pub fn frame(self, body: &Value) -> Result<FeatureFrame, SchemaError> {
        let body = body.as_object().ok_or(SchemaError::NotAnObject)?;

        let mut frame = FeatureFrame::default();
        let mut active = 0;
        for field in record_fields() {
            let cell = self.extract(body, field)?;

            if let FieldKind::Indicator(_) = field.kind {
                match &cell {
                    FeatureValue::Number(v) if *v == 1.0 => active += 1,
                    FeatureValue::Number(v) if *v == 0.0 => {}
                    FeatureValue::Number(v) => {
                        return Err(SchemaError::InvalidIndicator { field: field.name, value: *v })
                    }
                    _ => {}
                }
            }

            frame.push(self.column_name(field), cell);
        }

        if active != 1 {
            return Err(SchemaError::OneHot(active));
        }

        coerce_categoricals(&mut frame);
        fill_missing(&mut frame);
        Ok(frame)
    }
}

/// Accepts JSON numbers and strings holding a number.
fn lenient_number(field: &'static str, raw: &Value) -> Result<f64, SchemaError> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| SchemaError::InvalidNumber { field, value: raw.to_string() })
}

/// Renders a categorical code as text; integral values drop the fraction.
pub fn category_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn coerce_categoricals(frame: &mut FeatureFrame) {
    for (name, value) in frame.values_mut() {
        if !CATEGORICAL_COLUMNS.contains(&name) {
            continue;
        }
        let code = match value {
            FeatureValue::Number(n) => Some(*n),
            FeatureValue::Text(s) => s.trim().parse::<f64>().ok(),
            FeatureValue::Missing => None,
        };
        if let Some(code) = code {
            *value = FeatureValue::Text(category_text(code));
        }
    }
}

fn fill_missing(frame: &mut FeatureFrame) {
    for (_, value) in frame.values_mut() {
        if *value == FeatureValue::Missing {
            *value = FeatureValue::Text(MISSING_SENTINEL.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numeric_body() -> Value {
        let mut body = json!({
            "AGE_AT_END_REF_YR": 70.0,
            "SEX_IDENT_CD": 2.0,
            "BENE_RACE_CD": "1",
            "YEAR": "2023",
            "total_paid_amt": 310.25,
            "primary_dx_chronic_flag": 1,
        });
        let obj = body.as_object_mut().unwrap();
        for b in BodySystem::ALL {
            obj.insert(b.wire_key().to_string(), json!(u8::from(b == BodySystem::Respiratory)));
        }
        body
    }

    #[test]
    fn test_field_table_has_29_unique_fields() {
        let names: Vec<&str> = record_fields().map(|f| f.name).collect();
        assert_eq!(names.len(), 29);
        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), 29);
    }

    #[test]
    fn test_numeric_coerces_categoricals() {
        let frame = SchemaVariant::Numeric.frame(&numeric_body()).unwrap();
        assert_eq!(frame.len(), 29);
        assert_eq!(frame.get("SEX_IDENT_CD"), Some(&FeatureValue::Text("2".into())));
        assert_eq!(frame.get("BENE_RACE_CD"), Some(&FeatureValue::Text("1".into())));
        assert_eq!(frame.get("YEAR"), Some(&FeatureValue::Text("2023".into())));
        assert_eq!(frame.get("AGE_AT_END_REF_YR"), Some(&FeatureValue::Number(70.0)));
        assert_eq!(frame.get("bodysystem_respiratory"), Some(&FeatureValue::Number(1.0)));
    }

    #[test]
    fn test_numeric_requires_every_field() {
        let mut body = numeric_body();
        body.as_object_mut().unwrap().remove("total_paid_amt");
        assert_eq!(
            SchemaVariant::Numeric.frame(&body),
            Err(SchemaError::MissingField("total_paid_amt"))
        );
    }

    #[test]
    fn test_numeric_rejects_text() {
        let mut body = numeric_body();
        body["AGE_AT_END_REF_YR"] = json!("old");
        assert!(matches!(
            SchemaVariant::Numeric.frame(&body),
            Err(SchemaError::InvalidNumber { field: "AGE_AT_END_REF_YR", .. })
        ));
    }

    #[test]
    fn test_one_hot_violations() {
        let mut body = numeric_body();
        body["bodysystem_skin"] = json!(1);
        assert_eq!(SchemaVariant::Numeric.frame(&body), Err(SchemaError::OneHot(2)));

        body["bodysystem_skin"] = json!(0);
        body["bodysystem_respiratory"] = json!(0);
        assert_eq!(SchemaVariant::Numeric.frame(&body), Err(SchemaError::OneHot(0)));

        body["bodysystem_respiratory"] = json!(0.5);
        assert!(matches!(
            SchemaVariant::Numeric.frame(&body),
            Err(SchemaError::InvalidIndicator { field: "bodysystem_respiratory", .. })
        ));
    }

    #[test]
    fn test_defaulted_fills_and_renames() {
        let body = json!({ "bodysystem_eye": 1, "BENE_RACE_CD": null });
        let frame = SchemaVariant::Defaulted.frame(&body).unwrap();

        assert_eq!(frame.get("AGE_AT_END_REF_YR"), Some(&FeatureValue::Number(65.0)));
        assert_eq!(frame.get("YEAR"), Some(&FeatureValue::Text("2023".into())));
        assert_eq!(
            frame.get("BENE_RACE_CD"),
            Some(&FeatureValue::Text(MISSING_SENTINEL.into()))
        );
        assert_eq!(frame.get("bodysystem_Eye"), Some(&FeatureValue::Number(1.0)));
        assert_eq!(frame.get("bodysystem_eye"), None);
        assert_eq!(
            frame.column_names().collect::<Vec<_>>(),
            SchemaVariant::Defaulted.columns()
        );
    }

    #[test]
    fn test_string_codes_agree_across_variants() {
        let mut body = numeric_body();
        body["SEX_IDENT_CD"] = json!("2.0");
        body["YEAR"] = json!(" 2023.0 ");

        let numeric = SchemaVariant::Numeric.frame(&body).unwrap();
        let defaulted = SchemaVariant::Defaulted.frame(&body).unwrap();
        for column in CATEGORICAL_COLUMNS {
            assert_eq!(numeric.get(column), defaulted.get(column), "{column}");
        }
        assert_eq!(defaulted.get("SEX_IDENT_CD"), Some(&FeatureValue::Text("2".into())));
        assert_eq!(defaulted.get("YEAR"), Some(&FeatureValue::Text("2023".into())));
    }

    #[test]
    fn test_defaulted_keeps_non_numeric_codes() {
        let body = json!({ "bodysystem_ear": 1, "BENE_RACE_CD": "unknown" });
        let frame = SchemaVariant::Defaulted.frame(&body).unwrap();
        assert_eq!(frame.get("BENE_RACE_CD"), Some(&FeatureValue::Text("unknown".into())));
    }

    #[test]
    fn test_non_object_body() {
        assert_eq!(SchemaVariant::Numeric.frame(&json!([1, 2])), Err(SchemaError::NotAnObject));
    }

    #[test]
    fn test_row_follows_requested_order() {
        let frame = SchemaVariant::Numeric.frame(&numeric_body()).unwrap();
        let row = frame.to_row(&["YEAR", "AGE_AT_END_REF_YR", "bodysystem_respiratory"]).unwrap();
        assert_eq!(row.shape(), &[1, 3]);
        assert_eq!(row[[0, 0]], 2023.0);
        assert_eq!(row[[0, 1]], 70.0);
        assert_eq!(row[[0, 2]], 1.0);

        assert_eq!(
            frame.to_row(&["bodysystem_Eye"]),
            Err(SchemaError::UnknownColumn("bodysystem_Eye".into()))
        );
    }

    #[test]
    fn test_category_text() {
        assert_eq!(category_text(1.0), "1");
        assert_eq!(category_text(2023.0), "2023");
        assert_eq!(category_text(1.5), "1.5");
    }
}
