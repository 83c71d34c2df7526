// LangCheck Data Models
// Wire types for the text analytics API and evaluation results

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Code returned by the text analytics API when no language could be determined.
pub const UNKNOWN_LANGUAGE: &str = "(Unknown)";

// ============ Detection Batch ============

/// One document of a detection batch. `id` is the 0-based batch position,
/// never the corpus index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionDocument {
    pub id: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub documents: Vec<DetectionDocument>,
}

impl DetectionRequest {
    /// Build a batch in the given order, assigning batch positions as ids.
    pub fn from_sentences<S: AsRef<str>>(sentences: &[S]) -> Self {
        let documents = sentences
            .iter()
            .enumerate()
            .map(|(id, s)| DetectionDocument {
                id,
                text: s.as_ref().to_string(),
            })
            .collect();
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

// ============ Detection Result ============

/// Absent fields stay absent when the result is written back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectedLanguage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso6391_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetectedLanguage {
    pub fn iso_code(&self) -> &str {
        self.iso6391_name.as_deref().unwrap_or_default().trim()
    }

    pub fn is_unknown(&self) -> bool {
        let code = self.iso_code();
        code.is_empty() || code == UNKNOWN_LANGUAGE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedDocument {
    /// The API echoes ids back as strings; integers are accepted too.
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub detected_language: DetectedLanguage,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetectedDocument {
    pub fn batch_position(&self) -> Option<usize> {
        self.id.trim().parse().ok()
    }
}

/// Raw batch result. Fields this crate does not interpret are kept in `extra`
/// so the response can be handed back to callers unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResponse {
    #[serde(default)]
    pub documents: Vec<DetectedDocument>,
    #[serde(default)]
    pub errors: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetectionResponse {
    /// Detected language for a batch position, matched on document id.
    pub fn language_at(&self, position: usize) -> Option<&DetectedLanguage> {
        self.documents
            .iter()
            .find(|d| d.batch_position() == Some(position))
            .map(|d| &d.detected_language)
    }

    /// Detected ISO codes in document order.
    pub fn iso_codes(&self) -> Vec<&str> {
        self.documents
            .iter()
            .map(|d| d.detected_language.iso_code())
            .collect()
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "document id must be a string or number, got {}",
            other
        ))),
    }
}

// ============ Evaluation ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LanguageExample {
    pub corpus_index: usize,
    pub predicted: String,
    pub real: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOutcome {
    pub sample_size: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub unscored_count: usize,
    pub success_percentage: f64,
    /// Most recent successes, oldest first.
    pub success_examples: Vec<LanguageExample>,
    /// Most recent failures, oldest first.
    pub failure_examples: Vec<LanguageExample>,
}

impl EvaluationOutcome {
    pub fn last_success(&self) -> Option<&LanguageExample> {
        self.success_examples.last()
    }

    pub fn last_failure(&self) -> Option<&LanguageExample> {
        self.failure_examples.last()
    }
}

/// Example pair as rendered by the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExamplePair {
    #[serde(rename = "Predicted language")]
    pub predicted: String,
    #[serde(rename = "Real language")]
    pub real: String,
}

impl From<Option<&LanguageExample>> for ExamplePair {
    fn from(example: Option<&LanguageExample>) -> Self {
        example
            .map(|e| ExamplePair {
                predicted: e.predicted.clone(),
                real: e.real.clone(),
            })
            .unwrap_or_default()
    }
}

/// Compact report served by `/test_languages_nb_indices`. Field order is part
/// of the response contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    #[serde(rename = "a- Number of tests")]
    pub number_of_tests: usize,
    #[serde(rename = "b- Number of success")]
    pub number_of_success: usize,
    #[serde(rename = "c- Success percentage")]
    pub success_percentage: f64,
    #[serde(rename = "d- Success example")]
    pub success_example: ExamplePair,
    #[serde(rename = "e- Failure example")]
    pub failure_example: ExamplePair,
}

impl From<&EvaluationOutcome> for EvaluationReport {
    fn from(outcome: &EvaluationOutcome) -> Self {
        Self {
            number_of_tests: outcome.sample_size,
            number_of_success: outcome.success_count,
            success_percentage: outcome.success_percentage,
            success_example: outcome.last_success().into(),
            failure_example: outcome.last_failure().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_batch_positions() {
        let req = DetectionRequest::from_sentences(&["Hello", "Bonjour"]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"documents": [{"id": 0, "text": "Hello"}, {"id": 1, "text": "Bonjour"}]})
        );
    }

    #[test]
    fn test_response_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "documents": [{
                "id": "0",
                "detectedLanguage": {"name": "French", "iso6391Name": "fr", "confidenceScore": 1.0},
                "warnings": []
            }],
            "errors": [],
            "modelVersion": "2022-10-01"
        });
        let parsed: DetectionResponse = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.language_at(0).unwrap().iso_code(), "fr");
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn test_missing_language_fields_are_not_invented() {
        let raw = serde_json::json!({
            "documents": [{"id": "0", "detectedLanguage": {"iso6391Name": "fr"}}],
            "errors": []
        });
        let parsed: DetectionResponse = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.language_at(0).unwrap().name, None);
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn test_numeric_ids_accepted() {
        let raw = r#"{"documents":[{"id":3,"detectedLanguage":{"iso6391Name":"(Unknown)"}}]}"#;
        let parsed: DetectionResponse = serde_json::from_str(raw).unwrap();
        let lang = parsed.language_at(3).unwrap();
        assert!(lang.is_unknown());
        assert!(parsed.language_at(0).is_none());
    }

    #[test]
    fn test_report_key_order() {
        let outcome = EvaluationOutcome {
            sample_size: 2,
            success_count: 1,
            failure_count: 1,
            unscored_count: 0,
            success_percentage: 50.0,
            success_examples: vec![LanguageExample {
                corpus_index: 0,
                predicted: "fra".into(),
                real: "fra".into(),
            }],
            failure_examples: vec![],
        };
        let json = serde_json::to_string(&EvaluationReport::from(&outcome)).unwrap();
        assert_eq!(
            json,
            r#"{"a- Number of tests":2,"b- Number of success":1,"c- Success percentage":50.0,"d- Success example":{"Predicted language":"fra","Real language":"fra"},"e- Failure example":{"Predicted language":"","Real language":""}}"#
        );
    }
}
