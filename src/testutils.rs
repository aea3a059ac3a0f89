// Shared fixtures for unit tests: float assertions, a tiny set of genre
// artifacts and deterministic translation stubs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ndarray::Array1;

use crate::config::ModelSource;
use crate::error::{FilmceptionError, Result};
use crate::language::LanguageCode;
use crate::translate::{ModelLoader, ModelPair, Seq2SeqModel, TextTokenizer};

pub fn assert_epsilon_eq(actual: &Array1<f32>, expected: &[f32], epsilon: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch: {:?} vs {:?}", actual, expected);
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= epsilon,
            "index {}: {} differs from {} by more than {}",
            index,
            a,
            e,
            epsilon
        );
    }
}

/// Writes a six-term vectorizer, a linear model and the genre vocabulary
/// `["Adventure", "Fantasy", "Crime"]` into `dir`. Returns (model, vectorizer, genres).
pub fn write_genre_artifacts(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let vectorizer = serde_json::json!({
        "vocabulary": {
            "wizard": 0, "magical": 1, "power": 2, "save": 3, "detective": 4, "murder": 5
        },
        "idf": [1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
    });
    let model = serde_json::json!({
        "kind": "linear",
        "threshold": 0.5,
        "intercepts": [-1.0, -1.0, -1.0],
        "coefficients": [
            [1.0, 0.0, 1.0, 3.0, 0.0, 0.0],
            [3.0, 3.0, 1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 3.0, 3.0]
        ]
    });
    let genres = serde_json::json!(["Adventure", "Fantasy", "Crime"]);

    let model_path = dir.join("genre_model.json");
    let vectorizer_path = dir.join("tfidf_vectorizer.json");
    let genres_path = dir.join("genre_columns.json");
    std::fs::write(&model_path, model.to_string()).unwrap();
    std::fs::write(&vectorizer_path, vectorizer.to_string()).unwrap();
    std::fs::write(&genres_path, genres.to_string()).unwrap();

    (model_path, vectorizer_path, genres_path)
}

const PAD: u32 = 0;
const EOS: u32 = 1;

/// One id per character, offset past the special ids
pub struct StubTokenizer;

impl TextTokenizer for StubTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let mut ids: Vec<u32> = text.chars().map(|c| c as u32 + 2).collect();
        ids.push(EOS);
        Ok(ids)
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        ids.iter()
            .filter(|id| !skip_special_tokens || (**id != PAD && **id != EOS))
            .map(|id| {
                id.checked_sub(2)
                    .and_then(char::from_u32)
                    .ok_or_else(|| FilmceptionError::Translation(format!("Unknown id {}", id)))
            })
            .collect()
    }
}

/// Echoes the source behind a target-script prefix
pub struct StubModel {
    prefix: &'static str,
    fail_on: Option<String>,
}

impl Seq2SeqModel for StubModel {
    fn generate(&self, input_ids: &[u32]) -> Result<Vec<u32>> {
        let source: Vec<u32> = input_ids.iter().copied().filter(|id| *id != EOS).collect();

        if let Some(marker) = &self.fail_on {
            let text: String = source.iter().filter_map(|id| id.checked_sub(2).and_then(char::from_u32)).collect();
            if text.contains(marker.as_str()) {
                return Err(FilmceptionError::Translation(format!("stub refuses '{}'", text)));
            }
        }

        let mut output = vec![PAD];
        output.extend(self.prefix.chars().map(|c| c as u32 + 2));
        output.extend(source);
        output.push(EOS);
        Ok(output)
    }
}

fn prefix(code: LanguageCode) -> &'static str {
    match code {
        LanguageCode::Ur => "ترجمہ: ",
        LanguageCode::Ar => "ترجمة: ",
        LanguageCode::Ko => "번역: ",
    }
}

pub fn stub_pair(code: LanguageCode) -> ModelPair {
    ModelPair::new(
        Box::new(StubTokenizer),
        Box::new(StubModel {
            prefix: prefix(code),
            fail_on: None,
        }),
    )
}

/// Like [`stub_pair`] but generation fails for any text containing `marker`
pub fn stub_pair_failing_on(code: LanguageCode, marker: &str) -> ModelPair {
    ModelPair::new(
        Box::new(StubTokenizer),
        Box::new(StubModel {
            prefix: prefix(code),
            fail_on: Some(marker.to_string()),
        }),
    )
}

/// Hands out stub pairs and counts how often it was asked to
#[derive(Default)]
pub struct CountingLoader {
    pub loads: Arc<AtomicUsize>,
    delay: Duration,
}

impl CountingLoader {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            loads: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self, code: LanguageCode, _source: &ModelSource) -> Result<ModelPair> {
        std::thread::sleep(self.delay);
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(stub_pair(code))
    }
}
