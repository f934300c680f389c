//! Token counting for compression decisions

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

/// Tokens added per message for role and framing
const TOKENS_PER_MESSAGE: usize = 3;

/// Tokens priming the assistant reply
const REPLY_PRIMING_TOKENS: usize = 3;

/// Message as seen by a tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerMessage {
    pub role: String,
    pub content: String,
}

impl TokenizerMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }
}

/// Counts tokens the way a provider family would bill them
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, messages: &[TokenizerMessage]) -> usize;
}

/// Vocabulary family used to count tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenizerFamily {
    OpenAi,
    Anthropic,
    Cohere,
}

/// BPE tokenizer backed by tiktoken vocabularies
///
/// Anthropic and Cohere do not publish their vocabularies; `cl100k_base`
/// is a close enough proxy for comparing two encodings of the same data.
pub struct TiktokenTokenizer {
    bpe: Option<CoreBPE>,
}

impl TiktokenTokenizer {
    pub fn new(family: TokenizerFamily) -> Self {
        let bpe = match family {
            TokenizerFamily::OpenAi => tiktoken_rs::o200k_base(),
            TokenizerFamily::Anthropic | TokenizerFamily::Cohere => tiktoken_rs::cl100k_base(),
        };

        let bpe = bpe
            .inspect_err(|e| tracing::warn!(?family, error = %e, "failed to load tokenizer, estimating from length"))
            .ok();

        Self { bpe }
    }

    fn count_text(&self, text: &str) -> usize {
        self.bpe.as_ref().map_or_else(
            || text.chars().count().div_ceil(4),
            |bpe| bpe.encode_with_special_tokens(text).len(),
        )
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, messages: &[TokenizerMessage]) -> usize {
        messages
            .iter()
            .map(|m| TOKENS_PER_MESSAGE + self.count_text(&m.role) + self.count_text(&m.content))
            .sum::<usize>()
            + REPLY_PRIMING_TOKENS
    }
}

/// One tokenizer per family, built once and shared across requests
#[derive(Clone)]
pub struct Tokenizers {
    openai: Arc<dyn Tokenizer>,
    anthropic: Arc<dyn Tokenizer>,
    cohere: Arc<dyn Tokenizer>,
}

impl Tokenizers {
    pub fn tiktoken() -> Self {
        Self {
            openai: Arc::new(TiktokenTokenizer::new(TokenizerFamily::OpenAi)),
            anthropic: Arc::new(TiktokenTokenizer::new(TokenizerFamily::Anthropic)),
            cohere: Arc::new(TiktokenTokenizer::new(TokenizerFamily::Cohere)),
        }
    }

    /// Same tokenizer for every family
    pub fn uniform(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            openai: Arc::clone(&tokenizer),
            anthropic: Arc::clone(&tokenizer),
            cohere: tokenizer,
        }
    }

    pub fn for_family(&self, family: TokenizerFamily) -> Arc<dyn Tokenizer> {
        match family {
            TokenizerFamily::OpenAi => Arc::clone(&self.openai),
            TokenizerFamily::Anthropic => Arc::clone(&self.anthropic),
            TokenizerFamily::Cohere => Arc::clone(&self.cohere),
        }
    }
}

impl std::fmt::Debug for Tokenizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizers").finish_non_exhaustive()
    }
}
