// Multi-label genre classification
//
// A summary goes through the normalizer, is encoded by the tf-idf
// vectorizer, scored by the per-label model and decoded against the genre
// vocabulary. All three artifacts are loaded once and validated against
// each other before the classifier becomes usable.

pub mod model;
pub mod vectorizer;

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

pub use model::{GenreModel, GenreModelFile};
pub use vectorizer::{TfidfVectorizer, TfidfVectorizerModel};

use crate::config::ClassifierConfig;
use crate::error::{FilmceptionError, Result};
use crate::normalizer::Normalizer;

/// Genres predicted for one summary, in vocabulary order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenrePrediction(Vec<String>);

impl GenrePrediction {
    pub fn genres(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, genre: &str) -> bool {
        self.0.iter().any(|g| g == genre)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GenrePrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

pub struct Classifier {
    normalizer: Normalizer,
    vectorizer: TfidfVectorizer,
    model: GenreModel,
    genres: Vec<String>,
}

impl Classifier {
    pub fn load<P, Q, R>(model_path: P, vectorizer_path: Q, genres_path: R) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        Self::load_with_normalizer(model_path, vectorizer_path, genres_path, Normalizer::default())
    }

    pub fn from_config(config: &ClassifierConfig, normalizer: Normalizer) -> Result<Self> {
        Self::load_with_normalizer(
            &config.model_path,
            &config.vectorizer_path,
            &config.genres_path,
            normalizer,
        )
    }

    pub fn load_with_normalizer<P, Q, R>(
        model_path: P,
        vectorizer_path: Q,
        genres_path: R,
        normalizer: Normalizer,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        info!("Loading genre classifier from {}", model_path.as_ref().display());

        let model_file: GenreModelFile = read_artifact(model_path.as_ref(), "genre model")?;
        let vectorizer_model: TfidfVectorizerModel =
            read_artifact(vectorizer_path.as_ref(), "vectorizer")?;
        let genres: Vec<String> = read_artifact(genres_path.as_ref(), "genre vocabulary")?;

        let classifier = Self::from_parts(
            normalizer,
            TfidfVectorizer::new(vectorizer_model)?,
            GenreModel::new(model_file)?,
            genres,
        )?;

        info!(
            "Genre classifier ready: {} features, {} genres, threshold {}",
            classifier.vectorizer.dim(),
            classifier.genres.len(),
            classifier.model.threshold()
        );
        Ok(classifier)
    }

    /// Assemble a classifier from loaded parts, checking that the vectorizer
    /// output feeds the model and the model output matches the vocabulary.
    pub fn from_parts(
        normalizer: Normalizer,
        vectorizer: TfidfVectorizer,
        model: GenreModel,
        genres: Vec<String>,
    ) -> Result<Self> {
        if vectorizer.dim() != model.n_features() {
            return Err(FilmceptionError::Load(format!(
                "Vectorizer produces {} features but the model expects {}",
                vectorizer.dim(),
                model.n_features()
            )));
        }
        if model.n_labels() != genres.len() {
            return Err(FilmceptionError::Load(format!(
                "Model scores {} labels but the genre vocabulary has {} entries",
                model.n_labels(),
                genres.len()
            )));
        }
        for (index, genre) in genres.iter().enumerate() {
            if genres[..index].contains(genre) {
                return Err(FilmceptionError::Load(format!(
                    "Genre '{}' appears more than once in the vocabulary",
                    genre
                )));
            }
        }

        Ok(Self {
            normalizer,
            vectorizer,
            model,
            genres,
        })
    }

    pub fn genres(&self) -> &[String] {
        &self.genres
    }

    pub fn predict(&self, summary: &str) -> GenrePrediction {
        let normalized = self.normalizer.normalize(summary);
        debug!("Normalized summary: {}", normalized);

        let features = self.vectorizer.transform(&normalized);
        let indicators = self.model.predict(&features.view());

        GenrePrediction(
            indicators
                .iter()
                .zip(&self.genres)
                .filter(|(fired, _)| **fired)
                .map(|(_, genre)| genre.clone())
                .collect(),
        )
    }

    /// Probability of every genre, in vocabulary order
    pub fn scores(&self, summary: &str) -> Vec<(&str, f32)> {
        let normalized = self.normalizer.normalize(summary);
        let features = self.vectorizer.transform(&normalized);
        self.model
            .probabilities(&features.view())
            .iter()
            .zip(&self.genres)
            .map(|(p, genre)| (genre.as_str(), *p))
            .collect()
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        FilmceptionError::Load(format!("Cannot open {} file '{}': {}", what, path.display(), e))
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        FilmceptionError::Load(format!("Cannot deserialize {} '{}': {}", what, path.display(), e))
    })
}
