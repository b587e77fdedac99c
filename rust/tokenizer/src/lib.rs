//! Amharic Tokenizer: syllable-aware BPE for Ethiopic (Fidel) text.
//!
//! Fidel glyphs are syllables, so byte- or character-level BPE cannot learn
//! that ሉ, ሊ and ላ share a consonant. This crate first decomposes every
//! glyph into consonant and vowel units, then learns Byte Pair Encoding
//! merges over those units:
//!
//! - Deterministic decomposition table covering the syllable rows, 8th-order
//!   wa forms and labiovelars, validated for unambiguous reconstruction
//! - Frequency-ranked merge training with incremental pair counts via rayon
//! - Rank-ordered inference, integer IDs and lossless decoding back to Fidel
//! - JSON persistence of the complete state, with consistency checks on load
//!
//! ## Pipeline
//!
//! 1. Split text on whitespace; each word becomes a sequence of base units
//!    closed by `<eow>`
//! 2. Repeatedly merge the most frequent adjacent pair into a new token
//! 3. At inference, apply merges lowest rank first until none applies
//!
//! ## Usage
//!
//! ```rust
//! use amharic_tokenizer::{Tokenizer, TokenizerConfig};
//!
//! let mut tokenizer = Tokenizer::new(TokenizerConfig {
//!     num_merges: 100,
//!     max_vocab_size: Some(1_000),
//! })
//! .unwrap();
//! tokenizer.train("ሰላም ለሁሉም ሰላም ነው ሰላም");
//!
//! let ids = tokenizer.encode("ሰላም ነው");
//! assert_eq!(tokenizer.decode(&ids), "ሰላም ነው");
//! ```

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub mod error;
pub mod fidel;
pub mod state;
pub mod tokenizer;
pub mod trainer;
pub mod vocab;

#[cfg(feature = "python")]
pub mod python;

/// Python module entry point
#[cfg(feature = "python")]
#[pymodule]
fn amharic_tokenizer_rs(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<python::PyTokenizer>()?;
    Ok(())
}

// Re-export main types
pub use error::{ConfigError, Result, StateError, TableError, TokenizerError};
pub use fidel::{normalize_corpus, validate_table, EOW, UNK};
pub use tokenizer::{Decoding, Encoding, Tokenizer, TokenizerConfig};
pub use trainer::{StopReason, TrainOutcome, Trainer, TrainerConfig};
pub use vocab::{MergeRule, Vocab};
