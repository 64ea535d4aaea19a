//! Token counting and slicing for a fixed model vocabulary.
//!
//! All sizing in the pipeline is done in tokens, never characters, so that
//! chunk plans line up with what the backend actually bills against its
//! context window.

use tiktoken_rs::CoreBPE;
use tracing::trace;

use crate::error::{Result, SummaryError};

/// Token id in a tokenizer's vocabulary.
pub type TokenId = u32;

/// Pluggable tokenizer.
///
/// Implementations must be deterministic, and `decode(encode(text))` must
/// return `text` unchanged.
pub trait Tokenizer: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<TokenId>;

    /// Decode token ids back into text.
    fn decode(&self, tokens: &[TokenId]) -> Result<String>;

    /// Number of tokens in `text`.
    fn count_tokens(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// BPE tokenizer using the `cl100k_base` vocabulary (GPT-3.5 / GPT-4).
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// Load the `cl100k_base` vocabulary.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| SummaryError::Tokenizer(format!("failed to load cl100k_base: {}", e)))?;
        Ok(Self { bpe })
    }

    /// Decode token by token, replacing pieces that are not valid UTF-8 on
    /// their own.
    fn decode_lossy(&self, tokens: &[TokenId]) -> String {
        let mut text = String::new();
        for &token in tokens {
            match self.bpe.decode(vec![token as _]) {
                Ok(piece) => text.push_str(&piece),
                Err(_) => text.push(char::REPLACEMENT_CHARACTER),
            }
        }
        text
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn name(&self) -> &str {
        "cl100k_base"
    }

    fn encode(&self, text: &str) -> Vec<TokenId> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|t| t as TokenId)
            .collect()
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        match self.bpe.decode(tokens.iter().map(|&t| t as _).collect()) {
            Ok(text) => Ok(text),
            Err(e) => {
                // A slice boundary can split a multi-byte character.
                trace!(error = %e, tokens = tokens.len(), "Falling back to lossy decode");
                Ok(self.decode_lossy(tokens))
            }
        }
    }
}

/// One token per Unicode scalar value.
///
/// Needs no vocabulary file, which makes it handy for dry runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn name(&self) -> &str {
        "chars"
    }

    fn encode(&self, text: &str) -> Vec<TokenId> {
        text.chars().map(|c| c as TokenId).collect()
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        tokens
            .iter()
            .map(|&t| {
                char::from_u32(t)
                    .ok_or_else(|| SummaryError::Tokenizer(format!("invalid char token {}", t)))
            })
            .collect()
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count()
    }
}
