use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::error::{Result, FilmceptionError};
use crate::language::LanguageCode;

fn default_revision() -> String {
    "main".to_string()
}

fn default_max_new_tokens() -> usize {
    512
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    pub translate: TranslateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Serialized multi-label genre model
    pub model_path: PathBuf,
    /// Serialized tf-idf vectorizer
    pub vectorizer_path: PathBuf,
    /// Ordered genre labels, index-aligned with the model outputs
    pub genres_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Optional base-form lexicon used to validate lemma candidates
    pub lemma_lexicon: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Directory receiving one `translations_<code>.txt` per language
    pub output_dir: PathBuf,
    /// Upper bound on generated tokens per text
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    /// Inference device
    #[serde(default)]
    pub device: DeviceKind,
    /// Override for the model hub cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Model source per language code
    #[serde(default)]
    pub models: BTreeMap<String, ModelSource>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Cpu,
    Cuda,
}

/// Where the tokenizer and model of one language are fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSource {
    /// Hub repository id, or a local directory holding the same files
    pub repo: String,
    #[serde(default = "default_revision")]
    pub revision: String,
    /// Weights file; `model.safetensors` then `pytorch_model.bin` are tried when unset
    #[serde(default)]
    pub weights_file: Option<String>,
    /// Repository holding the tokenizer files when it differs from `repo`
    #[serde(default)]
    pub tokenizer_repo: Option<String>,
    /// `tokenizer.json` style file. When unset the sentencepiece layout of the
    /// Marian repositories is read: `source.spm`, `target.spm` and `vocab.json`.
    #[serde(default)]
    pub tokenizer_file: Option<String>,
    /// Separate `tokenizer.json` for decoding target-language ids
    #[serde(default)]
    pub decoder_tokenizer_file: Option<String>,
}

impl ModelSource {
    pub fn from_repo(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            revision: default_revision(),
            weights_file: None,
            tokenizer_repo: None,
            tokenizer_file: None,
            decoder_tokenizer_file: None,
        }
    }

    pub fn tokenizer_repo(&self) -> &str {
        self.tokenizer_repo.as_deref().unwrap_or(&self.repo)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("artifacts/genre_model.json"),
            vectorizer_path: PathBuf::from("artifacts/tfidf_vectorizer.json"),
            genres_path: PathBuf::from("artifacts/genre_columns.json"),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("translations"),
            max_new_tokens: default_max_new_tokens(),
            device: DeviceKind::Cpu,
            cache_dir: None,
            models: LanguageCode::ALL
                .iter()
                .map(|code| (code.as_str().to_string(), ModelSource::from_repo(code.default_model_id())))
                .collect(),
        }
    }
}

impl TranslateConfig {
    /// Resolve the model table: every supported code gets its configured source
    /// or the built-in default. Keys outside the supported set are rejected.
    pub fn model_sources(&self) -> Result<HashMap<LanguageCode, ModelSource>> {
        let mut sources: HashMap<LanguageCode, ModelSource> = LanguageCode::ALL
            .iter()
            .map(|code| (*code, ModelSource::from_repo(code.default_model_id())))
            .collect();

        for (key, source) in &self.models {
            let code = LanguageCode::from_str(key).map_err(|_| {
                FilmceptionError::Config(format!(
                    "No translation support for language '{}' in [translate.models]",
                    key
                ))
            })?;
            sources.insert(code, source.clone());
        }

        Ok(sources)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FilmceptionError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| FilmceptionError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FilmceptionError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| FilmceptionError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
