//! Form client: turns form selections into a [`PredictionRecord`], posts it
//! to `/predict`, and renders what comes back.

use std::ops::RangeInclusive;

use serde_json::Value;
use thiserror::Error;

use crate::models::{BodySystem, ChronicFlag, PredictionRecord, PredictionResponse, Race, Sex, Verdict};

pub const AGE_RANGE: RangeInclusive<u32> = 0..=120;
pub const YEAR_RANGE: RangeInclusive<u16> = 2020..=2100;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid form input: {0}")]
    InvalidInput(String),

    #[error("Error contacting prediction service.")]
    Transport(#[source] reqwest::Error),

    #[error("Error contacting prediction service.")]
    NotJson(#[source] serde_json::Error),

    #[error("API response missing required fields.")]
    MissingFields,
}

/// Selections as the form collects them.
#[derive(Debug, Clone, PartialEq)]
pub struct FormInput {
    pub age: u32,
    pub sex: Sex,
    pub race: Race,
    pub year: u16,
    pub total_paid_amt: f64,
    pub chronic: ChronicFlag,
    pub body_system: BodySystem,
}

impl Default for FormInput {
    fn default() -> Self {
        Self {
            age: 65,
            sex: Sex::default(),
            race: Race::default(),
            year: 2023,
            total_paid_amt: 0.0,
            chronic: ChronicFlag::default(),
            body_system: BodySystem::default(),
        }
    }
}

impl FormInput {
    pub fn validate(&self) -> Result<(), ClientError> {
        if !AGE_RANGE.contains(&self.age) {
            return Err(ClientError::InvalidInput(format!(
                "age must be between {} and {}, got {}",
                AGE_RANGE.start(),
                AGE_RANGE.end(),
                self.age
            )));
        }
        if !YEAR_RANGE.contains(&self.year) {
            return Err(ClientError::InvalidInput(format!(
                "year must be between {} and {}, got {}",
                YEAR_RANGE.start(),
                YEAR_RANGE.end(),
                self.year
            )));
        }
        if !self.total_paid_amt.is_finite() || self.total_paid_amt < 0.0 {
            return Err(ClientError::InvalidInput(format!(
                "total paid amount must be a non-negative number, got {}",
                self.total_paid_amt
            )));
        }
        Ok(())
    }

    pub fn to_record(&self) -> Result<PredictionRecord, ClientError> {
        self.validate()?;
        Ok(PredictionRecord {
            age: self.age,
            sex: self.sex,
            race: self.race,
            year: self.year,
            total_paid_amt: self.total_paid_amt,
            chronic: self.chronic,
            body_system: self.body_system,
        })
    }
}

/// Reads `prediction` and `probability` out of a response body. The HTTP
/// status is not consulted: an error body simply lacks the two keys.
pub fn interpret(body: &[u8]) -> Result<PredictionResponse, ClientError> {
    let value: Value = serde_json::from_slice(body).map_err(ClientError::NotJson)?;

    let probability = value.get("probability").and_then(Value::as_f64);
    let prediction = value.get("prediction").and_then(|p| {
        p.as_i64()
            .or_else(|| p.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
    });

    match (prediction, probability) {
        (Some(prediction), Some(probability)) => Ok(PredictionResponse { prediction, probability }),
        _ => Err(ClientError::MissingFields),
    }
}

/// Text shown for a successful prediction.
pub fn render(response: &PredictionResponse) -> String {
    let percent = (response.probability * 10_000.0).round() / 100.0;
    format!(
        "Prediction Result\nPrediction: {}\nProbability of Avoidable ED Visit: {:.2}%\n{}",
        response.prediction,
        percent,
        Verdict::from_probability(response.probability)
    )
}

pub struct PredictionClient {
    http: reqwest::Client,
    url: String,
}

impl PredictionClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One POST, no retry.
    pub async fn submit(&self, record: &PredictionRecord) -> Result<PredictionResponse, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .json(record)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        log::debug!("{} responded with {}", self.url, response.status());

        let body = response.bytes().await.map_err(ClientError::Transport)?;
        interpret(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_form_builds_record() {
        let record = FormInput::default().to_record().unwrap();
        let payload = record.to_payload();
        assert_eq!(payload["AGE_AT_END_REF_YR"], 65);
        assert_eq!(payload["SEX_IDENT_CD"], "1");
        assert_eq!(payload["BENE_RACE_CD"], "1");
        assert_eq!(payload["bodysystem_bloodimmune"], 1);
    }

    #[test]
    fn test_form_bounds() {
        let too_old = FormInput { age: 121, ..Default::default() };
        assert!(matches!(too_old.to_record(), Err(ClientError::InvalidInput(_))));

        let too_early = FormInput { year: 2019, ..Default::default() };
        assert!(too_early.validate().is_err());

        let negative = FormInput { total_paid_amt: -1.0, ..Default::default() };
        assert!(negative.validate().is_err());

        let edge = FormInput { age: 0, year: 2100, ..Default::default() };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_interpret_success() {
        let response = interpret(br#"{"prediction": 1, "probability": 0.8123}"#).unwrap();
        assert_eq!(response, PredictionResponse { prediction: 1, probability: 0.8123 });
    }

    #[test]
    fn test_interpret_missing_keys() {
        let err = interpret(br#"{"detail": "Prediction failed"}"#).unwrap_err();
        assert!(matches!(err, ClientError::MissingFields));
        assert_eq!(err.to_string(), "API response missing required fields.");

        let err = interpret(br#"{"prediction": 0}"#).unwrap_err();
        assert!(matches!(err, ClientError::MissingFields));
    }

    #[test]
    fn test_interpret_not_json() {
        let err = interpret(b"<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, ClientError::NotJson(_)));
        assert_eq!(err.to_string(), "Error contacting prediction service.");
    }

    #[test]
    fn test_render() {
        let text = render(&PredictionResponse { prediction: 1, probability: 0.5 });
        assert!(text.contains("Prediction: 1\n"));
        assert!(text.contains("50.00%"));
        assert!(text.ends_with("Likely Avoidable ED Visit"));

        let text = render(&PredictionResponse { prediction: 0, probability: 0.12345 });
        assert!(text.contains("Prediction: 0\n"));
        assert!(text.contains("12.35%") || text.contains("12.34%"));
        assert!(text.ends_with("Likely Non-Avoidable ED Visit"));
    }
}
