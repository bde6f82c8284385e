//! llama.cpp engine implementation

use std::num::NonZeroU32;
use std::ops::Range;
use std::path::Path;

use llama_cpp_2::{
    context::params::LlamaContextParams,
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{params::LlamaModelParams, AddBos, LlamaModel, Special},
    sampling::LlamaSampler,
};

use super::InferenceEngine;
use crate::config::EngineConfig;
use crate::error::EngineError;

/// llama.cpp backend. One backend per process.
pub struct LlamaCppEngine {
    backend: LlamaBackend,
    config: EngineConfig,
}

/// A model loaded by [`LlamaCppEngine`].
pub struct LlamaCppHandle {
    model: LlamaModel,
    max_tokens: usize,
}

impl LlamaCppEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let backend = LlamaBackend::init()
            .map_err(|e| EngineError::Load(format!("failed to initialize llama.cpp backend: {e}")))?;
        Ok(Self { backend, config })
    }

    fn context_params(&self) -> Result<LlamaContextParams, EngineError> {
        let mut params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.config.context_length))
            .with_n_batch(self.config.batch_size);

        if let Some(threads) = self.config.threads {
            let threads = i32::try_from(threads)
                .map_err(|_| EngineError::Load(format!("thread count {threads} is out of range")))?;
            params = params.with_n_threads(threads);
        }

        Ok(params)
    }

    fn batch_size(&self) -> usize {
        (self.config.batch_size as usize).max(1)
    }
}

impl InferenceEngine for LlamaCppEngine {
    type Handle = LlamaCppHandle;

    fn load(&mut self, path: &Path, max_tokens: usize) -> Result<Self::Handle, EngineError> {
        if !path.is_file() {
            return Err(EngineError::Load(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let params = LlamaModelParams::default().with_n_gpu_layers(self.config.gpu_layers);
        let model = LlamaModel::load_from_file(&self.backend, path, &params)
            .map_err(|e| EngineError::Load(format!("{}: {e}", path.display())))?;

        tracing::info!(
            path = %path.display(),
            parameters = model.n_params(),
            vocab = model.n_vocab(),
            "Loaded llama.cpp model"
        );

        Ok(LlamaCppHandle { model, max_tokens })
    }

    fn generate(&mut self, handle: &mut Self::Handle, prompt: &str) -> Result<String, EngineError> {
        let model = &handle.model;
        let mut ctx = model
            .new_context(&self.backend, self.context_params()?)
            .map_err(|e| EngineError::Generation(format!("failed to create context: {e}")))?;

        let tokens = model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| EngineError::Generation(format!("failed to tokenize prompt: {e}")))?;
        if tokens.is_empty() {
            return Err(EngineError::Generation("prompt produced no tokens".into()));
        }
        if tokens.len() + handle.max_tokens > self.config.context_length as usize {
            return Err(EngineError::Generation(format!(
                "prompt of {} tokens does not fit a {}-token context with {} new tokens",
                tokens.len(),
                self.config.context_length,
                handle.max_tokens
            )));
        }

        // The context accepts at most `n_batch` tokens per decode.
        let mut batch = LlamaBatch::new(self.batch_size(), 1);
        let last = tokens.len() - 1;
        for span in prompt_spans(tokens.len(), self.batch_size()) {
            batch.clear();
            for position in span {
                batch
                    .add(tokens[position], position as i32, &[0], position == last)
                    .map_err(|e| EngineError::Generation(format!("failed to batch prompt: {e}")))?;
            }
            ctx.decode(&mut batch)
                .map_err(|e| EngineError::Generation(format!("failed to decode prompt: {e}")))?;
        }

        let mut sampler = LlamaSampler::greedy();
        let mut position = tokens.len() as i32;
        let mut output = Vec::new();

        for _ in 0..handle.max_tokens {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);

            if model.is_eog_token(token) {
                break;
            }

            let bytes = model
                .token_to_bytes(token, Special::Tokenize)
                .map_err(|e| EngineError::Generation(format!("failed to detokenize: {e}")))?;
            output.extend_from_slice(&bytes);

            batch.clear();
            batch
                .add(token, position, &[0], true)
                .map_err(|e| EngineError::Generation(format!("failed to batch token: {e}")))?;
            position += 1;

            ctx.decode(&mut batch)
                .map_err(|e| EngineError::Generation(format!("failed to decode token: {e}")))?;
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    fn release(&mut self, handle: Self::Handle) -> Result<(), EngineError> {
        drop(handle);
        Ok(())
    }
}

/// Consecutive position ranges of at most `batch_size` prompt tokens.
fn prompt_spans(len: usize, batch_size: usize) -> impl Iterator<Item = Range<usize>> {
    (0..len)
        .step_by(batch_size)
        .map(move |start| start..(start + batch_size).min(len))
}
