//! The tokenizer aggregate: configuration plus vocabulary, with training
//! and inference entry points.
//!
//! Inference applies learned merges the way training discovered them: scan
//! every adjacent pair of every word, apply the single lowest-ranked merge
//! everywhere it occurs, and rescan until no known merge applies. Merges
//! never cross an `<eow>` boundary into the next word, so both the scan and
//! the rewrite run per word in parallel.

use rayon::prelude::*;
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::fidel::{self, EOW, UNK};
use crate::trainer::{TrainOutcome, Trainer, TrainerConfig};
use crate::vocab::{merge_pair, Vocab};

/// Settings persisted with the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Maximum number of merge iterations per training run
    pub num_merges: usize,
    /// Vocabulary ceiling, including the bootstrap tokens
    pub max_vocab_size: Option<usize>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            num_merges: 50_000,
            max_vocab_size: Some(10_000),
        }
    }
}

impl TokenizerConfig {
    /// Reject settings that could never train a usable model.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.num_merges == 0 {
            return Err(ConfigError::ZeroMerges);
        }
        if let Some(max_vocab_size) = self.max_vocab_size {
            let bootstrap_size = Vocab::bootstrap_size();
            if max_vocab_size <= bootstrap_size {
                return Err(ConfigError::VocabTooSmall {
                    max_vocab_size,
                    bootstrap_size,
                });
            }
        }
        Ok(())
    }
}

/// IDs for a text plus the number of tokens that fell back to `<unk>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    pub unknown: usize,
}

/// Text for a list of IDs plus the number of IDs outside the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoding {
    pub text: String,
    pub unknown: usize,
}

/// Fidel BPE tokenizer.
///
/// Training needs `&mut self`; every inference method takes `&self`, so a
/// trained tokenizer can be shared across threads without locking.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pub(crate) config: TokenizerConfig,
    pub(crate) vocab: Vocab,
    log_interval: u32,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::from_parts(TokenizerConfig::default(), Vocab::new())
    }
}

impl Tokenizer {
    /// Create an untrained tokenizer holding only the bootstrap vocabulary.
    pub fn new(config: TokenizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, Vocab::new()))
    }

    pub(crate) fn from_parts(config: TokenizerConfig, vocab: Vocab) -> Self {
        Self {
            config,
            vocab,
            log_interval: TrainerConfig::default().log_interval,
        }
    }

    /// Log training progress every `log_interval` merges (0 disables).
    pub fn with_log_interval(mut self, log_interval: u32) -> Self {
        self.log_interval = log_interval;
        self
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Number of registered tokens.
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Number of learned merge ranks.
    pub fn merge_count(&self) -> usize {
        self.vocab.merge_count()
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.id_of(token)
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.vocab.token_of(id)
    }

    pub fn merge_rank(&self, token: &str) -> Option<u32> {
        self.vocab.rank_of(token)
    }

    /// Learn merges from `corpus`; returns how many new merges were learned.
    pub fn train(&mut self, corpus: &str) -> usize {
        self.train_with_outcome(corpus).merges.len()
    }

    /// Like [`train`](Self::train), returning the full training report.
    pub fn train_with_outcome(&mut self, corpus: &str) -> TrainOutcome {
        let trainer = Trainer::new(TrainerConfig {
            num_merges: self.config.num_merges,
            max_vocab_size: self.config.max_vocab_size,
            log_interval: self.log_interval,
        });
        trainer.train(&mut self.vocab, corpus)
    }

    /// Train on the concatenated contents of UTF-8 text files.
    pub fn train_from_files(&mut self, file_paths: &[&Path]) -> Result<usize> {
        let mut corpus = String::new();
        for path in file_paths {
            corpus.push_str(&fs::read_to_string(path)?);
            corpus.push('\n');
        }
        Ok(self.train(&corpus))
    }

    /// Split text into learned tokens, `<eow>` closing every word.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut words = fidel::table().preprocess(text);

        loop {
            let best = words
                .par_iter()
                .enumerate()
                .filter_map(|(w, tokens)| {
                    self.lowest_rank_pair(tokens)
                        .map(|(rank, pos)| (rank, w, pos))
                })
                .min();

            let Some((_, w, pos)) = best else {
                break;
            };

            let left = words[w][pos].clone();
            let right = words[w][pos + 1].clone();
            let merged = format!("{left}{right}");

            words
                .par_iter_mut()
                .for_each(|tokens| {
                    if tokens.windows(2).any(|w| w[0] == left && w[1] == right) {
                        *tokens = merge_pair(tokens.as_slice(), &left, &right, &merged);
                    }
                });
        }

        words.into_iter().flatten().collect()
    }

    /// Rank and position of the first lowest-ranked mergeable pair in a word.
    fn lowest_rank_pair(&self, tokens: &[String]) -> Option<(u32, usize)> {
        let mut best: Option<(u32, usize)> = None;
        let mut joined = String::new();

        for (pos, pair) in tokens.windows(2).enumerate() {
            joined.clear();
            joined.push_str(&pair[0]);
            joined.push_str(&pair[1]);
            if let Some(rank) = self.vocab.rank_of(&joined) {
                if best.map_or(true, |(best_rank, _)| rank < best_rank) {
                    best = Some((rank, pos));
                }
            }
        }

        best
    }

    /// Convert text to token IDs.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.encode_with_stats(text).ids
    }

    /// Convert text to token IDs, counting tokens that map to `<unk>`.
    pub fn encode_with_stats(&self, text: &str) -> Encoding {
        let unk = self.vocab.unk_id();
        let mut unknown = 0;
        let ids = self
            .tokenize(text)
            .iter()
            .map(|token| {
                self.vocab.id_of(token).unwrap_or_else(|| {
                    unknown += 1;
                    unk
                })
            })
            .collect();
        Encoding { ids, unknown }
    }

    /// Convert token IDs back to text.
    pub fn decode(&self, ids: &[u32]) -> String {
        self.decode_with_stats(ids).text
    }

    /// Convert token IDs back to text, counting IDs outside the registry.
    pub fn decode_with_stats(&self, ids: &[u32]) -> Decoding {
        let mut unknown = 0;
        let tokens: Vec<&str> = ids
            .iter()
            .map(|&id| {
                self.vocab.token_of(id).unwrap_or_else(|| {
                    unknown += 1;
                    UNK
                })
            })
            .collect();
        Decoding {
            text: self.detokenize(&tokens),
            unknown,
        }
    }

    /// Rebuild Fidel text from tokens.
    ///
    /// Every `<eow>` becomes a word break and each word is recomposed glyph
    /// by glyph. `<unk>` markers are dropped, but units on either side of one
    /// are never fused into a single glyph; a word left empty disappears.
    pub fn detokenize<S: AsRef<str>>(&self, tokens: &[S]) -> String {
        let joined: String = tokens.iter().map(AsRef::as_ref).collect();
        let joined = joined.replace(EOW, " ");
        let table = fidel::table();

        joined
            .split_whitespace()
            .map(|word| {
                word.split(UNK)
                    .map(|piece| table.reconstruct_word(piece))
                    .collect::<String>()
            })
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenizerError;

    const CORPUS: &str = "ሰላም ለሁሉም ሰላም ነው ሰላም ለሁሉም ነው ኢትዮጵያ ሀገር ኢትዮጵያ ሀገራችን ነች";

    fn trained() -> Tokenizer {
        let mut tok = Tokenizer::new(TokenizerConfig {
            num_merges: 200,
            max_vocab_size: None,
        })
        .unwrap()
        .with_log_interval(0);
        tok.train(CORPUS);
        tok
    }

    #[test]
    fn test_config_rejects_zero_merges() {
        let err = Tokenizer::new(TokenizerConfig {
            num_merges: 0,
            max_vocab_size: None,
        })
        .unwrap_err();
        assert!(matches!(err, TokenizerError::Config(ConfigError::ZeroMerges)));
    }

    #[test]
    fn test_config_rejects_vocab_below_bootstrap() {
        let err = Tokenizer::new(TokenizerConfig {
            num_merges: 10,
            max_vocab_size: Some(Vocab::bootstrap_size()),
        })
        .unwrap_err();
        assert!(matches!(
            err,
            TokenizerError::Config(ConfigError::VocabTooSmall { .. })
        ));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(TokenizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_tokenize_without_merges_yields_units() {
        let tok = Tokenizer::default();
        assert_eq!(tok.tokenize("ሰላም"), vec!["ስ", "አ", "ል", "ኣ", "ም", EOW]);
    }

    #[test]
    fn test_roundtrip_without_merges() {
        let tok = Tokenizer::default();
        for text in ["ሀሁሂ", "ሰላም ለሁሉም", "ቋንቋ ኧረ ሏ", "ኢትዮጵያ አገሬ"] {
            assert_eq!(tok.detokenize(&tok.tokenize(text)), text);
        }
    }

    #[test]
    fn test_roundtrip_with_merges() {
        let tok = trained();
        assert!(tok.merge_count() > 0);
        for word in CORPUS.split_whitespace() {
            assert_eq!(tok.detokenize(&tok.tokenize(word)), word);
        }
        assert_eq!(tok.detokenize(&tok.tokenize(CORPUS)), CORPUS);
    }

    #[test]
    fn test_tokenize_uses_merges() {
        let tok = trained();
        let tokens = tok.tokenize("ሰላም");
        assert!(tokens.len() < 6, "expected merged tokens, got {tokens:?}");
        assert!(tokens.iter().all(|t| tok.token_to_id(t).is_some()));
    }

    #[test]
    fn test_lowest_rank_wins() {
        let mut tok = Tokenizer::default();
        tok.train("ለለለ");
        // rank 1: ልአ, rank 2: ልአልአ
        assert_eq!(tok.tokenize("ለለለ"), vec!["ልአልአ", "ልአ", EOW]);
        assert_eq!(tok.tokenize("ለለ ለ"), vec!["ልአልአ", EOW, "ልአ", EOW]);
    }

    #[test]
    fn test_encode_decode() {
        let tok = trained();
        for text in [CORPUS, "ሰላም", "ነው ነች"] {
            let ids = tok.encode(text);
            assert_eq!(tok.decode(&ids), tok.detokenize(&tok.tokenize(text)));
            assert_eq!(tok.decode(&ids), text);
        }
    }

    #[test]
    fn test_encode_single_tokens() {
        let tok = trained();
        for id in 0..tok.vocab.next_id() {
            let token = tok.id_to_token(id).unwrap();
            assert_eq!(tok.token_to_id(token), Some(id));
        }
    }

    #[test]
    fn test_encode_counts_unknown_tokens() {
        let tok = Tokenizer::default();
        let encoding = tok.encode_with_stats("ሀ። x");
        assert_eq!(encoding.unknown, 2);
        assert_eq!(encoding.ids.len(), 6);
        assert_eq!(encoding.ids[2], tok.vocab.unk_id());
        assert_eq!(tok.decode(&encoding.ids), "ሀ");
    }

    #[test]
    fn test_decode_counts_unknown_ids() {
        let tok = Tokenizer::default();
        let mut ids = tok.encode("ሀ");
        ids.insert(1, 999_999);
        let decoding = tok.decode_with_stats(&ids);
        assert_eq!(decoding.unknown, 1);
        assert_eq!(decoding.text, "ሀ");
    }

    #[test]
    fn test_unknown_never_fuses_neighbours() {
        let tok = Tokenizer::default();
        assert_eq!(tok.detokenize(&["ል", UNK, "አ", EOW]), "ልአ");

        let ids = [tok.token_to_id("ል").unwrap(), 999_999, tok.token_to_id("አ").unwrap()];
        let decoding = tok.decode_with_stats(&ids);
        assert_eq!(decoding.unknown, 1);
        assert_eq!(decoding.text, "ልአ");

        // without the marker the same units do form a glyph
        assert_eq!(tok.detokenize(&["ል", "አ", EOW]), "ለ");
        assert_eq!(tok.detokenize(&[UNK, EOW, "ሀ"]), "ሀ");
    }

    #[test]
    fn test_empty_input() {
        let tok = trained();
        assert!(tok.tokenize("").is_empty());
        assert!(tok.tokenize("   \n").is_empty());
        assert!(tok.encode("").is_empty());
        assert_eq!(tok.detokenize::<&str>(&[]), "");
        assert_eq!(tok.decode(&[]), "");
    }

    #[test]
    fn test_detokenize_literals_pass_through() {
        let tok = Tokenizer::default();
        let tokens = tok.tokenize("ሰላም። 2024");
        assert_eq!(tok.detokenize(&tokens), "ሰላም። 2024");
    }

    #[test]
    fn test_train_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.txt");
        fs::write(&path, "ለለለ\nለለለ\n").unwrap();

        let mut tok = Tokenizer::default().with_log_interval(0);
        let learned = tok.train_from_files(&[path.as_path()]).unwrap();
        assert!(learned > 0);

        let missing = dir.path().join("missing.txt");
        let err = tok.train_from_files(&[missing.as_path()]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_tokenizer_is_send_and_sync() {
        fn check<T: Send + Sync>() {}
        check::<Tokenizer>();
    }
}
