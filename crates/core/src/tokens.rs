use crate::error::IndexError;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Integer cost of a piece of text, used to bound chunk sizes. Pure and
/// deterministic; tests substitute a word counter to keep budgets readable.
pub trait TokenEstimator: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Production estimator over the cl100k_base byte-pair encoding.
pub struct Cl100kEstimator {
    bpe: CoreBPE,
}

impl Cl100kEstimator {
    pub fn new() -> Result<Self, IndexError> {
        let bpe = cl100k_base().map_err(|error| IndexError::Tokenizer(error.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenEstimator for Cl100kEstimator {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// Whitespace-token estimator. Cheap approximation used in tests and as a
/// fallback when exact budgets do not matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordEstimator;

impl TokenEstimator for WordEstimator {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}
