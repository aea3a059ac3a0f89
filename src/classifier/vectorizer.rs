use std::collections::HashMap;

use ndarray::Array1;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FilmceptionError, Result};

/// Two or more word characters, the default token pattern the vectorizer was fitted with
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\w\w+\b").expect("static pattern is valid")
});

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

/// Serialized form of a fitted tf-idf vectorizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizerModel {
    pub vocabulary: HashMap<String, usize>,
    /// Inverse document frequencies, index-aligned with the vocabulary.
    /// Absent when the vectorizer was fitted without idf weighting.
    #[serde(default)]
    pub idf: Option<Vec<f32>>,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default)]
    pub binary: bool,
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default = "default_norm")]
    pub norm: Option<Norm>,
}

pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Option<Array1<f32>>,
    ngram_range: (usize, usize),
    sublinear_tf: bool,
    binary: bool,
    lowercase: bool,
    norm: Option<Norm>,
}

impl TfidfVectorizer {
    pub fn new(model: TfidfVectorizerModel) -> Result<Self> {
        let dim = model.vocabulary.len();
        if dim == 0 {
            return Err(FilmceptionError::Load("Vectorizer vocabulary is empty".to_string()));
        }

        let mut slots = vec![false; dim];
        for (term, &index) in &model.vocabulary {
            match slots.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(FilmceptionError::Load(format!(
                        "Vectorizer vocabulary index {} is assigned twice (term '{}')",
                        index, term
                    )))
                }
                None => {
                    return Err(FilmceptionError::Load(format!(
                        "Vectorizer vocabulary index {} for term '{}' is out of range 0..{}",
                        index, term, dim
                    )))
                }
            }
        }

        if let Some(idf) = &model.idf {
            if idf.len() != dim {
                return Err(FilmceptionError::Load(format!(
                    "Vectorizer idf has {} entries but the vocabulary has {} terms",
                    idf.len(),
                    dim
                )));
            }
        }

        let (min_n, max_n) = model.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(FilmceptionError::Load(format!(
                "Invalid vectorizer ngram range ({}, {})",
                min_n, max_n
            )));
        }

        Ok(Self {
            vocabulary: model.vocabulary,
            idf: model.idf.map(Array1::from),
            ngram_range: model.ngram_range,
            sublinear_tf: model.sublinear_tf,
            binary: model.binary,
            lowercase: model.lowercase,
            norm: model.norm,
        })
    }

    /// Output dimensionality, fixed at load time
    pub fn dim(&self) -> usize {
        self.vocabulary.len()
    }

    /// Encode `text` over the fitted vocabulary. Unknown terms contribute nothing.
    pub fn transform(&self, text: &str) -> Array1<f32> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        let tokens: Vec<&str> = TOKEN_PATTERN.find_iter(&text).map(|m| m.as_str()).collect();

        let mut features = Array1::<f32>::zeros(self.dim());
        let (min_n, max_n) = self.ngram_range;
        for n in min_n..=max_n {
            for window in tokens.windows(n) {
                let term = window.join(" ");
                if let Some(&index) = self.vocabulary.get(&term) {
                    features[index] += 1.0;
                }
            }
        }

        if self.binary {
            features.mapv_inplace(|tf| if tf > 0.0 { 1.0 } else { 0.0 });
        } else if self.sublinear_tf {
            features.mapv_inplace(|tf| if tf > 0.0 { 1.0 + tf.ln() } else { 0.0 });
        }

        if let Some(idf) = &self.idf {
            features *= idf;
        }

        match self.norm {
            Some(Norm::L2) => {
                let norm = features.dot(&features).sqrt();
                if norm > 0.0 {
                    features /= norm;
                }
            }
            Some(Norm::L1) => {
                let norm: f32 = features.iter().map(|v| v.abs()).sum();
                if norm > 0.0 {
                    features /= norm;
                }
            }
            None => {}
        }

        features
    }
}
