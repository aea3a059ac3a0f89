use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::TranslationModelRegistry;
use crate::error::{FilmceptionError, Result};
use crate::language::LanguageCode;

/// Translations of one batch, index-aligned with the inputs
#[derive(Debug)]
pub struct TranslationOutcome {
    pub translations: Vec<String>,
    /// Artifact written for this batch, `None` when nothing was persisted by design
    pub output_path: Option<PathBuf>,
    /// Set when writing the artifact failed; the translations are still valid
    pub persistence_error: Option<FilmceptionError>,
}

impl TranslationOutcome {
    /// Outcome for text that needs no translation
    pub fn identity(texts: Vec<String>) -> Self {
        Self {
            translations: texts,
            output_path: None,
            persistence_error: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.output_path.is_some() && self.persistence_error.is_none()
    }
}

pub struct TranslationDispatcher {
    registry: Arc<TranslationModelRegistry>,
    output_dir: PathBuf,
}

impl TranslationDispatcher {
    pub fn new(registry: Arc<TranslationModelRegistry>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            output_dir: output_dir.into(),
        }
    }

    pub fn registry(&self) -> &TranslationModelRegistry {
        &self.registry
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Artifact path for a language: `<output_dir>/translations_<code>.txt`
    pub fn output_path(&self, code: LanguageCode) -> PathBuf {
        self.output_dir.join(format!("translations_{}.txt", code))
    }

    pub fn translate_all<S: AsRef<str>>(&self, texts: &[S], code: &str) -> Result<TranslationOutcome> {
        self.translate_all_code(texts, LanguageCode::from_str(code)?)
    }

    /// Translate every text in order with the language's cached model, then
    /// overwrite the language artifact with the full batch. A failing item
    /// aborts the batch; a failing write is reported in the outcome.
    pub fn translate_all_code<S: AsRef<str>>(
        &self,
        texts: &[S],
        code: LanguageCode,
    ) -> Result<TranslationOutcome> {
        info!("Translating {} text(s) to {}...", texts.len(), code);
        let pair = self.registry.get_code(code)?;

        let total = texts.len();
        let mut translations = Vec::with_capacity(total);
        for (idx, text) in texts.iter().enumerate() {
            let text = text.as_ref();
            debug!("Source [{}/{}]: {}", idx + 1, total, text);

            let translated = pair.translate(text).map_err(|e| {
                FilmceptionError::Translation(format!(
                    "Failed to translate text {}/{} to {}: {}",
                    idx + 1,
                    total,
                    code,
                    e
                ))
            })?;

            debug!("Target [{}/{}]: {}", idx + 1, total, translated);
            info!("Translated [{}/{}]", idx + 1, total);
            translations.push(translated);
        }

        let output_path = self.output_path(code);
        let persistence_error = match self.persist(&output_path, &translations) {
            Ok(()) => {
                info!("Saved {} translations to {}", total, output_path.display());
                None
            }
            Err(e) => {
                warn!("{}", e);
                Some(e)
            }
        };

        Ok(TranslationOutcome {
            translations,
            output_path: Some(output_path),
            persistence_error,
        })
    }

    /// Single-text form of [`translate_all`](Self::translate_all)
    pub fn translate_one(&self, text: &str, code: &str) -> Result<String> {
        let outcome = self.translate_all(&[text], code)?;
        outcome
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| FilmceptionError::Translation("No translation produced".to_string()))
    }

    fn persist(&self, path: &Path, translations: &[String]) -> Result<()> {
        let content: String = translations
            .iter()
            .map(|line| format!("{}\n", line))
            .collect();

        std::fs::create_dir_all(&self.output_dir)
            .and_then(|_| std::fs::write(path, content))
            .map_err(|source| FilmceptionError::Persistence {
                path: path.to_path_buf(),
                source,
            })
    }
}
