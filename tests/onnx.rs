//! Runs `OnnxClassifier` against `fixtures/linear_probability.onnx`: a
//! 29-input MatMul + Add graph with a single float output and no label
//! output. Only `total_paid_amt` carries weight (2^-10), so the output is
//! `total_paid_amt / 1024`.

use avoidable_ed::client::FormInput;
use avoidable_ed::{Classifier, FeatureFrame, ModelCard, ModelError, OnnxClassifier, SchemaVariant};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/linear_probability.onnx");

fn frame_with_paid(total_paid_amt: f64) -> FeatureFrame {
    let record = FormInput { total_paid_amt, ..Default::default() }.to_record().unwrap();
    SchemaVariant::Numeric.frame(&record.to_payload()).unwrap()
}

fn load(card: ModelCard) -> OnnxClassifier {
    OnnxClassifier::load(FIXTURE, card)
        .map_err(|e| e.to_string())
        .unwrap()
}

#[test]
fn test_probability_follows_the_artifact() {
    let classifier = load(ModelCard::for_variant(SchemaVariant::Numeric));

    assert_eq!(classifier.predict_proba(&frame_with_paid(256.0)).unwrap(), [0.75, 0.25]);
    assert_eq!(classifier.predict_proba(&frame_with_paid(768.0)).unwrap(), [0.25, 0.75]);
    assert!(classifier.describe().ends_with("linear_probability.onnx"));
}

#[test]
fn test_predict_thresholds_probability_without_label_output() {
    let classifier = load(ModelCard::for_variant(SchemaVariant::Numeric));

    for paid in [0.0, 256.0, 512.0, 768.0, 1024.0] {
        let frame = frame_with_paid(paid);
        let [_, positive] = classifier.predict_proba(&frame).unwrap();
        let expected = i64::from(positive >= 0.5);
        assert_eq!(classifier.predict(&frame).unwrap(), expected, "paid {paid}");
    }

    // Exactly at the threshold counts as positive.
    let at_threshold = frame_with_paid(512.0);
    assert_eq!(classifier.predict_proba(&at_threshold).unwrap(), [0.5, 0.5]);
    assert_eq!(classifier.predict(&at_threshold).unwrap(), 1);
}

#[test]
fn test_predict_uses_card_threshold() {
    let card = ModelCard { threshold: 0.8, ..ModelCard::for_variant(SchemaVariant::Numeric) };
    let classifier = load(card);

    assert_eq!(classifier.predict(&frame_with_paid(768.0)).unwrap(), 0);
    assert_eq!(classifier.predict(&frame_with_paid(1024.0)).unwrap(), 1);
}

#[test]
fn test_card_column_missing_from_frame() {
    let mut card = ModelCard::for_variant(SchemaVariant::Numeric);
    card.feature_names[28] = "bodysystem_Unacceptable".to_string();
    let classifier = load(card);

    let err = classifier.predict(&frame_with_paid(512.0)).unwrap_err();
    assert!(matches!(err, ModelError::Frame(_)));
}
