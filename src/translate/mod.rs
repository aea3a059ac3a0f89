// Translation of summaries into the supported target languages
//
// - registry: lazily loads one tokenizer/model pair per language and keeps it
//   for the lifetime of the process
// - dispatcher: translates batches in order and writes the per-language artifact
// - marian: the candle-backed Marian MT implementation of the traits below
// - sentencepiece: unigram tokenizers from the `source.spm`/`target.spm`/`vocab.json`
//   files the Marian repositories ship
//
// The traits are the seam between the dispatch logic and the inference
// backend; tests plug deterministic stubs in through `ModelLoader`.

pub mod dispatcher;
pub mod marian;
pub mod registry;
pub mod sentencepiece;

pub use dispatcher::{TranslationDispatcher, TranslationOutcome};
pub use marian::MarianLoader;
pub use registry::TranslationModelRegistry;

use crate::config::ModelSource;
use crate::error::Result;
use crate::language::LanguageCode;

/// Source-side encoding and target-side decoding
pub trait TextTokenizer: Send + Sync {
    /// Token ids for one text, padded to the batch length
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Text for generated ids, optionally dropping special/control tokens
    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String>;
}

/// Sequence-to-sequence generation
pub trait Seq2SeqModel: Send + Sync {
    fn generate(&self, input_ids: &[u32]) -> Result<Vec<u32>>;
}

/// A loaded tokenizer/model pair for one language
pub struct ModelPair {
    pub tokenizer: Box<dyn TextTokenizer>,
    pub model: Box<dyn Seq2SeqModel>,
}

impl ModelPair {
    pub fn new(tokenizer: Box<dyn TextTokenizer>, model: Box<dyn Seq2SeqModel>) -> Self {
        Self { tokenizer, model }
    }

    /// Encode, generate and decode a single text
    pub fn translate(&self, text: &str) -> Result<String> {
        let input_ids = self.tokenizer.encode(text)?;
        let output_ids = self.model.generate(&input_ids)?;
        self.tokenizer.decode(&output_ids, true)
    }
}

/// Loads the pair for a language. Loading is expensive and only the registry calls it.
#[cfg_attr(test, mockall::automock)]
pub trait ModelLoader: Send + Sync {
    fn load(&self, code: LanguageCode, source: &ModelSource) -> Result<ModelPair>;
}
