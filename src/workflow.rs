use std::sync::Arc;

use tracing::{info, warn};

use crate::classifier::{Classifier, GenrePrediction};
use crate::config::Config;
use crate::error::{FilmceptionError, Result};
use crate::language::Language;
use crate::normalizer::Normalizer;
use crate::translate::{MarianLoader, TranslationDispatcher, TranslationModelRegistry, TranslationOutcome};

/// Text handed to the speech collaborator, unchanged, with its language code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechHandoff {
    pub text: String,
    pub language_code: &'static str,
}

/// Result of analyzing one summary
#[derive(Debug)]
pub struct Analysis {
    pub genres: GenrePrediction,
    pub translation: TranslationOutcome,
    pub speech: SpeechHandoff,
}

pub struct Workflow {
    classifier: Arc<Classifier>,
    dispatcher: Arc<TranslationDispatcher>,
}

impl Workflow {
    pub fn new(classifier: Classifier, dispatcher: TranslationDispatcher) -> Self {
        Self {
            classifier: Arc::new(classifier),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Load the classifier artifacts and prepare (but not load) the translation models
    pub fn from_config(config: &Config) -> Result<Self> {
        let normalizer = Normalizer::from_config(&config.normalizer)?;
        let classifier = Classifier::from_config(&config.classifier, normalizer)?;

        let loader = MarianLoader::new(&config.translate);
        let registry = TranslationModelRegistry::from_config(Box::new(loader), &config.translate)?;
        let dispatcher = TranslationDispatcher::new(Arc::new(registry), &config.translate.output_dir);

        Ok(Self::new(classifier, dispatcher))
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn predict_genres(&self, summary: &str) -> Result<GenrePrediction> {
        validate_summary(summary)?;
        Ok(self.classifier.predict(summary))
    }

    /// Translate into `language`. English is returned as-is without touching a model or the output directory.
    pub fn translate(&self, texts: Vec<String>, language: Language) -> Result<TranslationOutcome> {
        match language.translation_code() {
            None => Ok(TranslationOutcome::identity(texts)),
            Some(code) => self.dispatcher.translate_all_code(&texts, code),
        }
    }

    /// Predict genres and translate the summary concurrently on blocking worker threads.
    /// The summary goes to both unchanged; only the emptiness check ignores surrounding whitespace.
    pub async fn analyze(&self, summary: &str, language: Language) -> Result<Analysis> {
        validate_summary(summary)?;
        let summary = summary.to_string();
        info!("Analyzing summary ({} chars) for {}", summary.len(), language);

        let classifier = Arc::clone(&self.classifier);
        let predict_input = summary.clone();
        let predict = tokio::task::spawn_blocking(move || classifier.predict(&predict_input));

        let dispatcher = Arc::clone(&self.dispatcher);
        let translate_input = summary.clone();
        let translate = tokio::task::spawn_blocking(move || match language.translation_code() {
            None => Ok(TranslationOutcome::identity(vec![translate_input])),
            Some(code) => dispatcher.translate_all_code(&[translate_input], code),
        });

        let (genres, translation) = tokio::join!(predict, translate);
        let genres = genres.map_err(|e| FilmceptionError::Task(format!("Genre prediction: {}", e)))?;
        let translation =
            translation.map_err(|e| FilmceptionError::Task(format!("Translation: {}", e)))??;

        if let Some(e) = &translation.persistence_error {
            warn!("Translation kept in memory only: {}", e);
        }

        let text = translation
            .translations
            .first()
            .cloned()
            .ok_or_else(|| FilmceptionError::Translation("No translation produced".to_string()))?;

        Ok(Analysis {
            genres,
            speech: SpeechHandoff {
                text,
                language_code: language.code(),
            },
            translation,
        })
    }
}

fn validate_summary(summary: &str) -> Result<()> {
    if summary.trim().is_empty() {
        return Err(FilmceptionError::InvalidInput("Summary is empty".to_string()));
    }
    Ok(())
}
