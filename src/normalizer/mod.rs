// Text normalization for genre prediction
//
// Pipeline, in order: lower-case, strip everything except [a-z0-9] and
// whitespace, tokenize (whitespace split, fused contractions such as
// "cannot" split in two), drop English stop words, lemmatize, re-join with
// single spaces. The output is a pure function of the input text.

pub mod lemmatizer;
pub mod stop_words;

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

pub use lemmatizer::Lemmatizer;
pub use stop_words::StopWords;

use crate::config::NormalizerConfig;
use crate::error::Result;

static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-z0-9\s]").expect("static pattern is valid")
});

/// Fused forms the word tokenizer splits, as (token, head, tail)
const CONTRACTIONS: &[(&str, &str, &str)] = &[
    ("cannot", "can", "not"),
    ("gimme", "gim", "me"),
    ("gonna", "gon", "na"),
    ("gotta", "got", "ta"),
    ("lemme", "lem", "me"),
    ("wanna", "wan", "na"),
];

fn split_contraction(token: &str) -> Vec<&str> {
    match CONTRACTIONS.iter().find(|(fused, _, _)| *fused == token) {
        Some((_, head, tail)) => vec![*head, *tail],
        None => vec![token],
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    stop_words: StopWords,
    lemmatizer: Lemmatizer,
}

impl Normalizer {
    pub fn new(stop_words: StopWords, lemmatizer: Lemmatizer) -> Self {
        Self {
            stop_words,
            lemmatizer,
        }
    }

    pub fn from_config(config: &NormalizerConfig) -> Result<Self> {
        match &config.lemma_lexicon {
            Some(path) => Self::with_lexicon(path),
            None => Ok(Self::default()),
        }
    }

    pub fn with_lexicon<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(StopWords::english(), Lemmatizer::from_lexicon_file(path)?))
    }

    pub fn normalize(&self, text: &str) -> String {
        self.tokens(text).join(" ")
    }

    /// The surviving lemmas, in input order
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let cleaned = NON_ALPHANUMERIC.replace_all(&lowered, "");

        cleaned
            .split_whitespace()
            .flat_map(split_contraction)
            .filter(|token| !self.stop_words.contains(token))
            .map(|token| {
                self.lemmatizer
                    .lemmatize_with(token, |lemma| self.stop_words.contains(lemma))
            })
            .collect()
    }
}
