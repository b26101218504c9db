use crate::config::{IndexConfig, StopWordSet};
use rustc_hash::FxHashMap;

/// A term together with the word position it was found at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
}

/// Splits text into lowercase alphanumeric words.
///
/// Every word advances the position counter, including the ones that are
/// dropped for being stop words or too short, so phrase offsets stay
/// comparable between documents and queries.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: StopWordSet,
    min_term_length: usize,
}

impl Tokenizer {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            stop_words: config.stop_words().clone(),
            min_term_length: config.min_term_length(),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .enumerate()
            .filter_map(|(position, word)| {
                let term = word.to_lowercase();
                if self.is_indexable(&term) {
                    Some(Token {
                        term,
                        position: position as u32,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Whether an already-lowercased word is kept by this tokenizer
    pub fn is_indexable(&self, term: &str) -> bool {
        term.chars().count() >= self.min_term_length && !self.stop_words.contains(term)
    }

    /// Tokenize and fold into per-term statistics
    pub fn analyze(&self, text: &str, keep_positions: bool) -> Analysis {
        let tokens = self.tokenize(text);
        let mut term_freqs: FxHashMap<String, u32> = FxHashMap::default();
        let mut positions: FxHashMap<String, Vec<u32>> = FxHashMap::default();

        for token in &tokens {
            *term_freqs.entry(token.term.clone()).or_insert(0) += 1;
            if keep_positions {
                positions
                    .entry(token.term.clone())
                    .or_default()
                    .push(token.position);
            }
        }

        Analysis {
            length: tokens.len() as u32,
            term_freqs,
            positions: keep_positions.then_some(positions),
        }
    }
}

/// Per-document term statistics produced by [`Tokenizer::analyze`]
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Number of indexed tokens
    pub length: u32,
    pub term_freqs: FxHashMap<String, u32>,
    /// Word positions per term, when proximity indexing is on
    pub positions: Option<FxHashMap<String, Vec<u32>>>,
}
