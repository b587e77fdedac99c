//! Error types for tokenizer construction, persistence and table validation.
//!
//! Lookup misses (unknown tokens on encode, unknown IDs on decode) are not
//! errors; they resolve to the `<unk>` marker and are counted in
//! [`Encoding`](crate::tokenizer::Encoding) / [`Decoding`](crate::tokenizer::Decoding).

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TokenizerError>;

/// Top-level error returned by the public API.
#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("corrupt tokenizer state: {0}")]
    State(#[from] StateError),
    #[error("decomposition table defect: {0}")]
    Table(#[from] TableError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize tokenizer state: {0}")]
    Serialize(serde_json::Error),
}

impl TokenizerError {
    /// True when the error means the model file does not exist, as opposed
    /// to existing but being unreadable as a tokenizer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Rejected tokenizer settings. Reported at construction, never clamped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("merge budget must be at least 1")]
    ZeroMerges,
    #[error("max_vocab_size ({max_vocab_size}) must exceed the bootstrap vocabulary ({bootstrap_size})")]
    VocabTooSmall {
        max_vocab_size: usize,
        bootstrap_size: usize,
    },
}

/// Structural problems found while loading a persisted tokenizer.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("malformed state document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("id {id} is assigned to both {first:?} and {second:?}")]
    DuplicateId {
        id: u32,
        first: String,
        second: String,
    },
    #[error("token {token:?} has id {id}, outside the registry of {next_id} ids")]
    IdOutOfRange { token: String, id: u32, next_id: u32 },
    #[error("token_to_id and id_to_token disagree on {0:?}")]
    RegistryMismatch(String),
    #[error("next_id is {next_id} but the registry holds {registered} tokens")]
    NextIdMismatch { next_id: u32, registered: usize },
    #[error("rank {rank} is shared by {first:?} and {second:?}")]
    RankCollision {
        rank: u32,
        first: String,
        second: String,
    },
    #[error("merge ranks are not contiguous from 1: rank {0} is missing")]
    RankGap(u32),
    #[error("token {0:?} is referenced but not registered")]
    UnregisteredToken(String),
    #[error("registered token {0:?} has no vocabulary weight")]
    MissingWeight(String),
    #[error("base unit {0:?} is missing from the registry")]
    MissingBaseUnit(String),
    #[error("reserved marker {0:?} is missing")]
    MissingMarker(&'static str),
}

/// Authoring defects in the static decomposition table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("glyph {0:?} decomposes to an empty sequence")]
    EmptySequence(char),
    #[error("glyphs {first:?} and {second:?} share the decomposition {units:?}")]
    Collision {
        first: char,
        second: char,
        units: String,
    },
    #[error("glyph sequence {expected:?} reads back as {reconstructed:?}")]
    Ambiguous {
        expected: String,
        reconstructed: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguished() {
        let missing: TokenizerError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(missing.is_not_found());

        let corrupt: TokenizerError = StateError::RankGap(3).into();
        assert!(!corrupt.is_not_found());
    }

    #[test]
    fn test_messages_name_the_problem() {
        let err = ConfigError::VocabTooSmall {
            max_vocab_size: 10,
            bootstrap_size: 45,
        };
        assert_eq!(
            err.to_string(),
            "max_vocab_size (10) must exceed the bootstrap vocabulary (45)"
        );
    }
}
