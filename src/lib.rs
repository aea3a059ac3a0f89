//! Filmception - Movie Summary Genre Prediction and Translation
//!
//! Predicts the genres of a free-text movie summary with a pretrained
//! multi-label text classifier and translates summaries into Urdu, Arabic
//! or Korean with per-language neural translation models that are loaded
//! once and cached for the lifetime of the process.

pub mod cli;
pub mod config;
pub mod workflow;
pub mod normalizer;
pub mod classifier;
pub mod translate;
pub mod language;
pub mod error;

#[cfg(test)]
pub mod testutils;
