//! JSON persistence of the full tokenizer state.
//!
//! The document is a flat object with sorted keys and unescaped Fidel, so
//! saved models stay readable and diff cleanly:
//!
//! ```json
//! {
//!   "num_merges": 50000,
//!   "max_vocab_size": 10000,
//!   "vocabulary": { "<eow>": 0, "ልአ": 3, ... },
//!   "merge_rank_map": { "ልአ": 1, ... },
//!   "token_to_id": { "<eow>": 0, ... },
//!   "id_to_token": { "0": "<eow>", ... },
//!   "next_id": 44
//! }
//! ```
//!
//! Loading checks the document for internal consistency before anything is
//! built from it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StateError, TokenizerError};
use crate::fidel::{self, EOW, UNK};
use crate::tokenizer::{Tokenizer, TokenizerConfig};
use crate::vocab::Vocab;

/// On-disk schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenizerState {
    num_merges: usize,
    // required key; `null` means no ceiling
    #[serde(deserialize_with = "Option::deserialize")]
    max_vocab_size: Option<usize>,
    vocabulary: BTreeMap<String, u64>,
    merge_rank_map: BTreeMap<String, u32>,
    token_to_id: BTreeMap<String, u32>,
    id_to_token: BTreeMap<u32, String>,
    next_id: u32,
}

impl TokenizerState {
    fn capture(tokenizer: &Tokenizer) -> Self {
        let vocab = &tokenizer.vocab;
        Self {
            num_merges: tokenizer.config.num_merges,
            max_vocab_size: tokenizer.config.max_vocab_size,
            vocabulary: vocab.weights.iter().map(|(k, &v)| (k.clone(), v)).collect(),
            merge_rank_map: vocab
                .merge_ranks
                .iter()
                .map(|(k, &v)| (k.clone(), v))
                .collect(),
            token_to_id: vocab
                .token_to_id
                .iter()
                .map(|(k, &v)| (k.clone(), v))
                .collect(),
            id_to_token: vocab
                .id_to_token
                .iter()
                .enumerate()
                .map(|(id, token)| (id as u32, token.clone()))
                .collect(),
            next_id: vocab.next_id(),
        }
    }

    /// Check the registry is a dense bijection and the ranks a clean sequence.
    fn into_tokenizer(self) -> Result<Tokenizer> {
        let config = TokenizerConfig {
            num_merges: self.num_merges,
            max_vocab_size: self.max_vocab_size,
        };
        config.validate()?;

        let next_id = self.next_id;
        let mut owners: HashMap<u32, &str> = HashMap::with_capacity(self.token_to_id.len());
        for (token, &id) in &self.token_to_id {
            if id >= next_id {
                return Err(StateError::IdOutOfRange {
                    token: token.clone(),
                    id,
                    next_id,
                }
                .into());
            }
            if let Some(first) = owners.insert(id, token) {
                return Err(StateError::DuplicateId {
                    id,
                    first: first.to_string(),
                    second: token.clone(),
                }
                .into());
            }
        }
        if owners.len() != next_id as usize {
            return Err(StateError::NextIdMismatch {
                next_id,
                registered: owners.len(),
            }
            .into());
        }

        if let Some((&id, token)) = self.id_to_token.iter().find(|&(&id, _)| id >= next_id) {
            return Err(StateError::IdOutOfRange {
                token: token.clone(),
                id,
                next_id,
            }
            .into());
        }
        let mut id_to_token = Vec::with_capacity(next_id as usize);
        for id in 0..next_id {
            let owner = owners[&id];
            if self.id_to_token.get(&id).map(String::as_str) != Some(owner) {
                return Err(StateError::RegistryMismatch(owner.to_string()).into());
            }
            id_to_token.push(owner.to_string());
        }

        for marker in [EOW, UNK] {
            if !self.token_to_id.contains_key(marker) {
                return Err(StateError::MissingMarker(marker).into());
            }
        }
        if let Some(unit) = fidel::table()
            .base_units()
            .into_iter()
            .find(|unit| !self.token_to_id.contains_key(unit))
        {
            return Err(StateError::MissingBaseUnit(unit).into());
        }

        for token in self.vocabulary.keys() {
            if !self.token_to_id.contains_key(token) {
                return Err(StateError::UnregisteredToken(token.clone()).into());
            }
        }
        if let Some(token) = self.token_to_id.keys().find(|t| !self.vocabulary.contains_key(*t)) {
            return Err(StateError::MissingWeight(token.clone()).into());
        }

        let mut by_rank: BTreeMap<u32, &str> = BTreeMap::new();
        for (token, &rank) in &self.merge_rank_map {
            if !self.token_to_id.contains_key(token) {
                return Err(StateError::UnregisteredToken(token.clone()).into());
            }
            if let Some(first) = by_rank.insert(rank, token) {
                return Err(StateError::RankCollision {
                    rank,
                    first: first.to_string(),
                    second: token.clone(),
                }
                .into());
            }
        }
        for (expected, &rank) in (1u32..).zip(by_rank.keys()) {
            if rank != expected {
                return Err(StateError::RankGap(expected).into());
            }
        }

        let vocab = Vocab {
            weights: self.vocabulary.into_iter().collect(),
            merge_ranks: self.merge_rank_map.into_iter().collect(),
            token_to_id: self.token_to_id.into_iter().collect(),
            id_to_token,
        };

        Ok(Tokenizer::from_parts(config, vocab))
    }
}

/// `path` with a `.json` extension appended unless it already has one.
fn with_json_extension(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "json") {
        return path.to_path_buf();
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(".json");
    PathBuf::from(name)
}

impl Tokenizer {
    /// Serialize the full state as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&TokenizerState::capture(self))
            .map_err(TokenizerError::Serialize)
    }

    /// Rebuild a tokenizer from [`to_json`](Self::to_json) output.
    pub fn from_json(json: &str) -> Result<Self> {
        let state: TokenizerState = serde_json::from_str(json).map_err(StateError::from)?;
        state.into_tokenizer()
    }

    /// Save to a JSON file; `.json` is appended when missing.
    ///
    /// Returns the path actually written.
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        let path = with_json_extension(path);
        fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    /// Load from a JSON file; `.json` is appended when missing.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(with_json_extension(path))?;
        Self::from_json(&json)
    }
}
