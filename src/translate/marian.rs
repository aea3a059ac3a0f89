use std::path::{Path, PathBuf};
use std::sync::Mutex;

use candle::{DType, Device, Tensor, D};
use candle_nn::VarBuilder;
use candle_transformers::models::marian::{Config as MarianConfig, MTModel};
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde_json::{json, Map, Value};
use tokenizers::{PaddingParams, Tokenizer};
use tracing::{debug, info};

use super::sentencepiece::{self, SOURCE_MODEL_FILE, TARGET_MODEL_FILE, VOCAB_FILE};
use super::{ModelLoader, ModelPair, Seq2SeqModel, TextTokenizer};
use crate::config::{DeviceKind, ModelSource, TranslateConfig};
use crate::error::{FilmceptionError, Result};
use crate::language::LanguageCode;

const CONFIG_FILE: &str = "config.json";
const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

/// Loads Marian MT models from the model hub (or a local directory) onto a candle device
pub struct MarianLoader {
    device: DeviceKind,
    max_new_tokens: usize,
    cache_dir: Option<PathBuf>,
}

/// Files of one model repository
enum RepoFiles {
    Local(PathBuf),
    Hub { name: String, repo: ApiRepo },
}

impl RepoFiles {
    fn get(&self, file: &str) -> Result<PathBuf> {
        match self {
            Self::Local(dir) => {
                let path = dir.join(file);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(FilmceptionError::Load(format!("{} not found in {}", file, dir.display())))
                }
            }
            Self::Hub { name, repo } => {
                debug!("Fetching {} from {}", file, name);
                repo.get(file)
                    .map_err(|e| FilmceptionError::Load(format!("Failed to fetch {} from {}: {}", file, name, e)))
            }
        }
    }
}

impl MarianLoader {
    pub fn new(config: &TranslateConfig) -> Self {
        Self {
            device: config.device,
            max_new_tokens: config.max_new_tokens,
            cache_dir: config.cache_dir.clone(),
        }
    }

    /// A local directory when `repo` names one, the hub repository otherwise
    fn open_repo(&self, repo: &str, revision: &str) -> Result<RepoFiles> {
        let local = Path::new(repo);
        if local.is_dir() {
            return Ok(RepoFiles::Local(local.to_path_buf()));
        }

        let mut builder = ApiBuilder::new();
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        let api = builder
            .build()
            .map_err(|e| FilmceptionError::Load(format!("Failed to initialize model hub API: {}", e)))?;

        Ok(RepoFiles::Hub {
            name: format!("{}@{}", repo, revision),
            repo: api.repo(Repo::with_revision(repo.to_string(), RepoType::Model, revision.to_string())),
        })
    }

    fn build_device(&self) -> Result<Device> {
        match self.device {
            DeviceKind::Cpu => Ok(Device::Cpu),
            DeviceKind::Cuda => Device::new_cuda(0)
                .map_err(|e| FilmceptionError::Load(format!("CUDA device unavailable: {}", e))),
        }
    }
}

/// The configured weights file, or the first of `model.safetensors` and `pytorch_model.bin` present
fn fetch_weights(files: &RepoFiles, weights_file: Option<&str>) -> Result<PathBuf> {
    if let Some(file) = weights_file {
        return files.get(file);
    }
    let mut last_error = None;
    for file in WEIGHT_FILES {
        match files.get(file) {
            Ok(path) => return Ok(path),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| FilmceptionError::Load("No model weights found".to_string())))
}

fn load_tokenizer(files: &RepoFiles, source: &ModelSource) -> Result<MarianTokenizer> {
    match &source.tokenizer_file {
        Some(file) => {
            let encoder = files.get(file)?;
            let decoder = match &source.decoder_tokenizer_file {
                Some(file) => files.get(file)?,
                None => encoder.clone(),
            };
            MarianTokenizer::from_files(&encoder, &decoder)
        }
        None => MarianTokenizer::from_sentencepiece(
            &files.get(SOURCE_MODEL_FILE)?,
            &files.get(TARGET_MODEL_FILE)?,
            &files.get(VOCAB_FILE)?,
        ),
    }
}

/// Parse `config.json`, filling the fields older exports leave out
fn parse_config(bytes: &[u8]) -> Result<MarianConfig> {
    let mut value: Value = serde_json::from_slice(bytes)
        .map_err(|e| FilmceptionError::Load(format!("Invalid Marian config: {}", e)))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| FilmceptionError::Load("Marian config is not a JSON object".to_string()))?;

    if let Some(eos) = object.get("eos_token_id").cloned() {
        fill_missing(object, "forced_eos_token_id", eos);
    }
    if let Some(pad) = object.get("pad_token_id").cloned() {
        fill_missing(object, "decoder_start_token_id", pad);
    }
    fill_missing(object, "share_encoder_decoder_embeddings", json!(true));
    fill_missing(object, "use_cache", json!(true));
    fill_missing(object, "is_encoder_decoder", json!(true));
    fill_missing(object, "scale_embedding", json!(true));
    fill_missing(object, "activation_function", json!("swish"));

    serde_json::from_value(value).map_err(|e| FilmceptionError::Load(format!("Invalid Marian config: {}", e)))
}

fn fill_missing(object: &mut Map<String, Value>, key: &str, default: Value) {
    if object.get(key).map_or(true, Value::is_null) {
        object.insert(key.to_string(), default);
    }
}

impl ModelLoader for MarianLoader {
    fn load(&self, code: LanguageCode, source: &ModelSource) -> Result<ModelPair> {
        let device = self.build_device()?;
        let files = self.open_repo(&source.repo, &source.revision)?;

        let config = parse_config(&std::fs::read(files.get(CONFIG_FILE)?)?)?;

        let tokenizer = match &source.tokenizer_repo {
            Some(repo) if repo != &source.repo => {
                load_tokenizer(&self.open_repo(repo, &source.revision)?, source)?
            }
            _ => load_tokenizer(&files, source)?,
        };

        let weights = fetch_weights(&files, source.weights_file.as_deref())?;
        let vb = if weights.extension().map_or(false, |ext| ext == "safetensors") {
            unsafe { VarBuilder::from_mmaped_safetensors(&[&weights], DType::F32, &device) }
        } else {
            VarBuilder::from_pth(&weights, DType::F32, &device)
        }
        .map_err(|e| FilmceptionError::Load(format!("Failed to load weights {}: {}", weights.display(), e)))?;

        let model = MTModel::new(&config, vb)
            .map_err(|e| FilmceptionError::Load(format!("Failed to build Marian model for {}: {}", code, e)))?;

        info!(
            "Marian model for {} ready ({} encoder / {} decoder layers, {:?})",
            code, config.encoder_layers, config.decoder_layers, self.device
        );

        Ok(ModelPair::new(
            Box::new(tokenizer),
            Box::new(MarianModel {
                model: Mutex::new(model),
                device,
                decoder_start_token_id: config.decoder_start_token_id,
                eos_token_id: config.eos_token_id,
                forced_eos_token_id: config.forced_eos_token_id,
                max_new_tokens: self.max_new_tokens,
            }),
        ))
    }
}

/// Source-language encoder tokenizer plus target-language decoder tokenizer
pub struct MarianTokenizer {
    encoder: Tokenizer,
    decoder: Tokenizer,
}

impl MarianTokenizer {
    pub fn from_files(encoder_path: &Path, decoder_path: &Path) -> Result<Self> {
        let encoder = Tokenizer::from_file(encoder_path).map_err(|e| {
            FilmceptionError::Load(format!("Tokenizer load failed ({}): {}", encoder_path.display(), e))
        })?;
        let decoder = Tokenizer::from_file(decoder_path).map_err(|e| {
            FilmceptionError::Load(format!("Tokenizer load failed ({}): {}", decoder_path.display(), e))
        })?;

        Ok(Self::new(encoder, decoder))
    }

    /// Both sides share the ids of `vocab_path` and score pieces with their own model
    pub fn from_sentencepiece(source_model: &Path, target_model: &Path, vocab_path: &Path) -> Result<Self> {
        let vocab = sentencepiece::read_vocab(vocab_path)?;
        let encoder = sentencepiece::unigram_tokenizer(source_model, &vocab)?;
        let decoder = sentencepiece::unigram_tokenizer(target_model, &vocab)?;
        Ok(Self::new(encoder, decoder))
    }

    fn new(mut encoder: Tokenizer, decoder: Tokenizer) -> Self {
        encoder.with_padding(Some(PaddingParams::default()));
        Self { encoder, decoder }
    }
}

impl TextTokenizer for MarianTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .encoder
            .encode(text, true)
            .map_err(|e| FilmceptionError::Translation(format!("Tokenizer encode error: {}", e)))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.decoder
            .decode(ids, skip_special_tokens)
            .map_err(|e| FilmceptionError::Translation(format!("Tokenizer decode error: {}", e)))
    }
}

/// Greedy encoder-decoder generation over a Marian model
pub struct MarianModel {
    model: Mutex<MTModel>,
    device: Device,
    decoder_start_token_id: u32,
    eos_token_id: u32,
    forced_eos_token_id: u32,
    max_new_tokens: usize,
}

impl MarianModel {
    fn run(&self, model: &mut MTModel, input_ids: &[u32]) -> candle::Result<Vec<u32>> {
        let tokens = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
        let encoder_xs = model.encoder().forward(&tokens, 0)?;

        let mut output_ids = vec![self.decoder_start_token_id];
        for index in 0..self.max_new_tokens {
            // after the first step the kv cache holds everything but the newest token
            let context_size = if index >= 1 { 1 } else { output_ids.len() };
            let start_pos = output_ids.len().saturating_sub(context_size);
            let input = Tensor::new(&output_ids[start_pos..], &self.device)?.unsqueeze(0)?;

            let logits = model.decode(&input, &encoder_xs, start_pos)?;
            let logits = logits.squeeze(0)?;
            let logits = logits.get(logits.dim(0)? - 1)?;
            let next = logits.argmax(D::Minus1)?.to_scalar::<u32>()?;

            output_ids.push(next);
            if next == self.eos_token_id || next == self.forced_eos_token_id {
                break;
            }
        }
        Ok(output_ids)
    }
}

/// Encoder input terminated by exactly one trailing eos
fn with_eos(input_ids: &[u32], eos_token_id: u32) -> Vec<u32> {
    let mut ids = input_ids.to_vec();
    if ids.last() != Some(&eos_token_id) {
        ids.push(eos_token_id);
    }
    ids
}

impl Seq2SeqModel for MarianModel {
    fn generate(&self, input_ids: &[u32]) -> Result<Vec<u32>> {
        let ids = with_eos(input_ids, self.eos_token_id);

        let mut model = self
            .model
            .lock()
            .map_err(|_| FilmceptionError::Translation("Marian model lock poisoned".to_string()))?;
        let result = self.run(&mut model, &ids);
        model.reset_kv_cache();

        result.map_err(|e| FilmceptionError::Translation(format!("Generation failed: {}", e)))
    }
}
