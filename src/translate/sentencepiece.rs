//! Unigram tokenizers from the sentencepiece files shipped with Marian models.
//!
//! A Marian repository carries one sentencepiece model per side (`source.spm`,
//! `target.spm`) and a `vocab.json` that fixes the ids both sides share. Each
//! vocabulary entry takes its score from the side's sentencepiece model;
//! entries the model does not know get a floor score so encoding prefers the
//! side's own pieces.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use prost::Message;
use tokenizers::models::unigram::Unigram;
use tokenizers::normalizers::NFKC;
use tokenizers::pre_tokenizers::metaspace::{Metaspace, PrependScheme};
use tokenizers::{AddedToken, Tokenizer};
use tracing::debug;

use crate::error::{FilmceptionError, Result};

pub const SOURCE_MODEL_FILE: &str = "source.spm";
pub const TARGET_MODEL_FILE: &str = "target.spm";
pub const VOCAB_FILE: &str = "vocab.json";

const UNK_TOKEN: &str = "<unk>";
const SPECIAL_TOKENS: [&str; 3] = ["</s>", UNK_TOKEN, "<pad>"];
const MISSING_PIECE_SCORE: f64 = -100.0;
const WORD_BOUNDARY: char = '\u{2581}';

/// The subset of sentencepiece's `ModelProto` needed to score pieces
#[derive(Clone, PartialEq, Message)]
pub struct ModelProto {
    #[prost(message, repeated, tag = "1")]
    pub pieces: Vec<ModelPiece>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ModelPiece {
    #[prost(string, optional, tag = "1")]
    pub piece: Option<String>,
    #[prost(float, optional, tag = "2")]
    pub score: Option<f32>,
    #[prost(int32, optional, tag = "3")]
    pub kind: Option<i32>,
}

/// Pieces of `vocab.json` ordered by id. Ids must cover `0..len` exactly once.
pub fn read_vocab(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path)
        .map_err(|e| FilmceptionError::Load(format!("Cannot read vocabulary '{}': {}", path.display(), e)))?;
    let ids: HashMap<String, u32> = serde_json::from_slice(&bytes)
        .map_err(|e| FilmceptionError::Load(format!("Invalid vocabulary '{}': {}", path.display(), e)))?;

    let mut pieces: Vec<Option<String>> = vec![None; ids.len()];
    for (piece, id) in ids {
        let slot = pieces
            .get_mut(id as usize)
            .filter(|slot| slot.is_none())
            .ok_or_else(|| {
                FilmceptionError::Load(format!(
                    "Vocabulary '{}' has a duplicate or out-of-range id {}",
                    path.display(),
                    id
                ))
            })?;
        *slot = Some(piece);
    }

    // every slot is filled once ids are unique and in range
    Ok(pieces.into_iter().flatten().collect())
}

/// Piece scores from a serialized sentencepiece model
pub fn read_scores(path: &Path) -> Result<HashMap<String, f32>> {
    let bytes = fs::read(path).map_err(|e| {
        FilmceptionError::Load(format!("Cannot read sentencepiece model '{}': {}", path.display(), e))
    })?;
    let model = ModelProto::decode(bytes.as_slice()).map_err(|e| {
        FilmceptionError::Load(format!("Invalid sentencepiece model '{}': {}", path.display(), e))
    })?;

    Ok(model
        .pieces
        .into_iter()
        .filter_map(|p| p.piece.map(|piece| (piece, p.score.unwrap_or(0.0))))
        .collect())
}

/// Unigram tokenizer over `vocab`, scored by the sentencepiece model at `model_path`
pub fn unigram_tokenizer(model_path: &Path, vocab: &[String]) -> Result<Tokenizer> {
    let scores = read_scores(model_path)?;
    let unk_id = vocab
        .iter()
        .position(|piece| piece == UNK_TOKEN)
        .ok_or_else(|| FilmceptionError::Load(format!("Vocabulary has no {} entry", UNK_TOKEN)))?;

    let mut known = 0;
    let entries: Vec<(String, f64)> = vocab
        .iter()
        .map(|piece| {
            let score = match scores.get(piece) {
                Some(score) => {
                    known += 1;
                    f64::from(*score)
                }
                None if SPECIAL_TOKENS.contains(&piece.as_str()) => 0.0,
                None => MISSING_PIECE_SCORE,
            };
            (piece.clone(), score)
        })
        .collect();
    debug!(
        "{}: {} of {} vocabulary entries scored",
        model_path.display(),
        known,
        vocab.len()
    );

    let model = Unigram::from(entries, Some(unk_id), false)
        .map_err(|e| FilmceptionError::Load(format!("Cannot build unigram model: {}", e)))?;

    let mut tokenizer = Tokenizer::new(model);
    tokenizer.with_normalizer(Some(NFKC));
    tokenizer.with_pre_tokenizer(Some(Metaspace::new(WORD_BOUNDARY, PrependScheme::Always, true)));
    tokenizer.with_decoder(Some(Metaspace::new(WORD_BOUNDARY, PrependScheme::Always, true)));

    let specials: Vec<AddedToken> = SPECIAL_TOKENS
        .iter()
        .filter(|token| vocab.iter().any(|piece| piece == *token))
        .map(|token| AddedToken::from(*token, true))
        .collect();
    tokenizer.add_special_tokens(&specials);

    Ok(tokenizer)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    pub(crate) const VOCAB: [&str; 7] = ["</s>", "<unk>", "▁a", "▁detective", "▁de", "tective", "<pad>"];

    pub(crate) fn spm_bytes(pieces: &[(&str, f32)]) -> Vec<u8> {
        ModelProto {
            pieces: pieces
                .iter()
                .map(|(piece, score)| ModelPiece {
                    piece: Some(piece.to_string()),
                    score: Some(*score),
                    kind: Some(1),
                })
                .collect(),
        }
        .encode_to_vec()
    }

    pub(crate) fn vocab_json() -> String {
        let ids: HashMap<&str, usize> = VOCAB.iter().enumerate().map(|(id, piece)| (*piece, id)).collect();
        serde_json::to_string(&ids).unwrap()
    }

    pub(crate) const FULL_PIECES: [(&str, f32); 6] = [
        ("<unk>", 0.0),
        ("</s>", 0.0),
        ("▁a", -1.0),
        ("▁detective", -2.0),
        ("▁de", -3.0),
        ("tective", -3.0),
    ];

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn vocab() -> Vec<String> {
        VOCAB.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_read_vocab_orders_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), VOCAB_FILE, vocab_json().as_bytes());
        assert_eq!(read_vocab(&path).unwrap(), vocab());
    }

    #[test]
    fn test_read_vocab_rejects_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), VOCAB_FILE, br#"{"</s>": 0, "<unk>": 5}"#);
        assert!(matches!(read_vocab(&path), Err(FilmceptionError::Load(_))));

        let path = write(dir.path(), "dup.json", br#"{"</s>": 0, "<unk>": 0}"#);
        assert!(matches!(read_vocab(&path), Err(FilmceptionError::Load(_))));
    }

    #[test]
    fn test_encode_and_decode_with_source_scores() {
        let dir = tempfile::tempdir().unwrap();
        let spm = write(dir.path(), SOURCE_MODEL_FILE, &spm_bytes(&FULL_PIECES));

        let tokenizer = unigram_tokenizer(&spm, &vocab()).unwrap();
        let encoding = tokenizer.encode("a detective", false).unwrap();
        assert_eq!(encoding.get_ids(), [2, 3]);
        assert_eq!(tokenizer.decode(&[6, 2, 3, 0], true).unwrap(), "a detective");
    }

    #[test]
    fn test_pieces_missing_from_the_model_are_avoided() {
        let dir = tempfile::tempdir().unwrap();
        let pieces: Vec<(&str, f32)> = FULL_PIECES
            .iter()
            .copied()
            .filter(|(piece, _)| *piece != "▁detective")
            .collect();
        let spm = write(dir.path(), SOURCE_MODEL_FILE, &spm_bytes(&pieces));

        let tokenizer = unigram_tokenizer(&spm, &vocab()).unwrap();
        let encoding = tokenizer.encode("a detective", false).unwrap();
        assert_eq!(encoding.get_ids(), [2, 4, 5]);
    }

    #[test]
    fn test_vocab_without_unk_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let spm = write(dir.path(), SOURCE_MODEL_FILE, &spm_bytes(&FULL_PIECES));
        let vocab = vec!["</s>".to_string(), "▁a".to_string()];
        assert!(matches!(unigram_tokenizer(&spm, &vocab), Err(FilmceptionError::Load(_))));
    }

    #[test]
    fn test_corrupt_model_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let spm = write(dir.path(), SOURCE_MODEL_FILE, &[0xff, 0xff, 0xff]);
        assert!(matches!(read_scores(&spm), Err(FilmceptionError::Load(_))));
        assert!(matches!(
            read_scores(&dir.path().join("missing.spm")),
            Err(FilmceptionError::Load(_))
        ));
    }
}
