//! # Request handling
//!
//! `ChatService` is the glue between a UI event and the model: it renders the
//! prompt template, runs one generation pass on a blocking thread and hands
//! back display text. Errors never escape it; they become the text shown to
//! the user.
//!
//! The model itself sits behind the `TextGenerator` trait so the service can
//! be driven without weights in tests.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::{AddBos, LlamaModel};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::LlamaToken;
use tokio::sync::Semaphore;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::InferenceConfig;
use crate::error::ChatError;
use super::loader::{backend, ModelInfo};
use super::params::GenerationParams;
use super::template::{clean_response, ChatTemplate, IM_END};

pub const EMPTY_PROMPT_REPLY: &str = "Please enter a prompt.";

/// Bytes reserved for a single token piece
const PIECE_BUFFER: usize = 64;

/// Raw output of one generation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// Runs a single sampling pass over an already formatted prompt.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Generation, ChatError>;
}

/// One stage of the sampling chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplerStage {
    Temperature(f32),
    TopP(f32),
}

/// Temperature rescales the logits before the nucleus is cut.
pub fn sampler_stages(params: &GenerationParams) -> Vec<SamplerStage> {
    vec![
        SamplerStage::Temperature(params.temperature),
        SamplerStage::TopP(params.top_p),
    ]
}

fn build_sampler(stages: &[SamplerStage], seed: u32) -> LlamaSampler {
    let mut chain: Vec<LlamaSampler> = stages
        .iter()
        .map(|stage| match *stage {
            SamplerStage::Temperature(t) => LlamaSampler::temp(t),
            SamplerStage::TopP(p) => LlamaSampler::top_p(p, 1),
        })
        .collect();
    chain.push(LlamaSampler::dist(seed));
    LlamaSampler::chain_simple(chain)
}

/// Rejects requests whose prompt plus completion cannot fit the context window.
pub fn check_fits(prompt_tokens: usize, max_tokens: u32, context_size: u32) -> Result<(), ChatError> {
    if prompt_tokens + max_tokens as usize > context_size as usize {
        return Err(ChatError::ContextOverflow {
            prompt_tokens,
            max_tokens,
            context_size,
        });
    }
    Ok(())
}

/// What the sampler produced for one position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// End-of-generation token
    End,
    /// Raw bytes of a sampled token
    Piece(Vec<u8>),
}

/// Pulls tokens from `next` until end of generation, an `<|im_end|>` marker
/// or `max_tokens` pieces. Bytes are joined before decoding so characters
/// split across tokens survive.
pub fn collect_completion<F>(max_tokens: usize, mut next: F) -> Result<(String, usize), ChatError>
where
    F: FnMut() -> Result<Step, ChatError>,
{
    let mut bytes: Vec<u8> = Vec::new();
    let mut count = 0;
    while count < max_tokens {
        match next()? {
            Step::End => break,
            Step::Piece(piece) => {
                bytes.extend_from_slice(&piece);
                count += 1;
                if bytes.ends_with(IM_END.as_bytes()) {
                    break;
                }
            }
        }
    }
    if count == max_tokens {
        debug!("Reached max token limit ({})", max_tokens);
    }
    Ok((String::from_utf8_lossy(&bytes).into_owned(), count))
}

/// `TextGenerator` backed by llama.cpp. Every call gets a fresh context, so
/// nothing leaks from one request into the next.
pub struct LlamaGenerator {
    model: LlamaModel,
    context_size: u32,
    batch_size: u32,
    threads: Option<u32>,
}

impl LlamaGenerator {
    pub fn new(model: LlamaModel, config: &InferenceConfig) -> Self {
        Self {
            model,
            context_size: config.context_size,
            batch_size: config.batch_size,
            threads: config.threads,
        }
    }

    fn context_params(&self) -> Result<LlamaContextParams, ChatError> {
        let n_ctx = NonZeroU32::new(self.context_size)
            .ok_or_else(|| ChatError::Session("context_size must be non-zero".to_string()))?;
        let mut params = LlamaContextParams::default()
            .with_n_ctx(Some(n_ctx))
            .with_n_batch(self.batch_size);
        if let Some(threads) = self.threads {
            params = params
                .with_n_threads(threads as i32)
                .with_n_threads_batch(threads as i32);
        }
        Ok(params)
    }
}

impl TextGenerator for LlamaGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Generation, ChatError> {
        let tokens = self.model
            .str_to_token(prompt, AddBos::Never)
            .map_err(|e| ChatError::Tokenization(e.to_string()))?;
        let prompt_tokens = tokens.len();
        if prompt_tokens == 0 {
            return Err(ChatError::Tokenization("prompt produced no tokens".to_string()));
        }
        check_fits(prompt_tokens, params.max_tokens, self.context_size)?;

        let mut ctx = self.model
            .new_context(backend()?, self.context_params()?)
            .map_err(|e| ChatError::Session(e.to_string()))?;

        // The prompt is fed in chunks no larger than n_batch.
        let batch_size = self.batch_size.max(1) as usize;
        let mut batch = LlamaBatch::new(batch_size, 1);
        let last = prompt_tokens - 1;
        for (chunk_index, chunk) in tokens.chunks(batch_size).enumerate() {
            batch.clear();
            for (offset, token) in chunk.iter().enumerate() {
                let pos = chunk_index * batch_size + offset;
                batch.add(*token, pos as i32, &[0], pos == last)
                    .map_err(|e| ChatError::Session(e.to_string()))?;
            }
            ctx.decode(&mut batch)
                .map_err(|e| ChatError::Generation(e.to_string()))?;
        }
        debug!("Context filled with {} prompt tokens", prompt_tokens);

        let mut sampler = build_sampler(&sampler_stages(params), rand::random());
        let mut position = prompt_tokens as i32;
        let mut pending: Option<LlamaToken> = None;

        let (text, completion_tokens) = collect_completion(params.max_tokens as usize, || {
            if let Some(token) = pending.take() {
                batch.clear();
                batch.add(token, position, &[0], true)
                    .map_err(|e| ChatError::Generation(e.to_string()))?;
                ctx.decode(&mut batch)
                    .map_err(|e| ChatError::Generation(e.to_string()))?;
                position += 1;
            }

            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            if self.model.is_eog_token(token) {
                return Ok(Step::End);
            }
            let piece = self.model
                .token_to_piece_bytes(token, PIECE_BUFFER, true, None)
                .map_err(|e| ChatError::Generation(e.to_string()))?;
            pending = Some(token);
            Ok(Step::Piece(piece))
        })?;

        Ok(Generation {
            text,
            prompt_tokens,
            completion_tokens,
        })
    }
}

/// Turns a message and four knobs into the text shown to the user.
pub struct ChatService {
    generator: Arc<dyn TextGenerator>,
    template: ChatTemplate,
    defaults: GenerationParams,
    permits: Arc<Semaphore>,
    info: ModelInfo,
}

impl ChatService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        info: ModelInfo,
        defaults: GenerationParams,
        max_concurrent: usize,
    ) -> Self {
        Self {
            generator,
            template: ChatTemplate::new(),
            defaults,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            info,
        }
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    /// Knob values used when a request leaves them out
    pub fn defaults(&self) -> GenerationParams {
        self.defaults
    }

    /// Answers one message. Failures are reported in the returned text.
    pub async fn chat(&self, prompt: &str, params: GenerationParams) -> String {
        if prompt.trim().is_empty() {
            return EMPTY_PROMPT_REPLY.to_string();
        }

        let request_id = Uuid::new_v4();
        let span = info_span!("chat", %request_id);
        async {
            match self.try_chat(prompt, params).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Chat request failed: {}", e);
                    format!("Error generating response: {}", e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Answers one message, surfacing failures as errors.
    pub async fn try_chat(&self, prompt: &str, params: GenerationParams) -> Result<String, ChatError> {
        params.validate()?;

        info!(
            max_tokens = params.max_tokens,
            temperature = params.temperature,
            top_p = params.top_p,
            enable_thinking = params.enable_thinking,
            "Generating response"
        );

        let text = self.template.render(prompt, params.enable_thinking);

        // The permit travels with the blocking task so an abandoned request
        // keeps its slot until generation really ends.
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ChatError::Task(e.to_string()))?;

        let generator = Arc::clone(&self.generator);
        let started = Instant::now();
        let generation = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            generator.generate(&text, &params)
        })
        .await??;

        info!(
            prompt_tokens = generation.prompt_tokens,
            completion_tokens = generation.completion_tokens,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation finished"
        );

        Ok(clean_response(&generation.text))
    }
}
