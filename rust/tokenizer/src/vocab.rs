//! Vocabulary and ID registry.
//!
//! The vocabulary starts with every base unit of the Fidel table plus the
//! `<eow>` and `<unk>` markers, inserted in sorted order so that an identical
//! table always yields identical bootstrap IDs. Training appends merged
//! tokens; nothing is ever removed.
//!
//! Structure:
//! - IDs 0..bootstrap: base units and markers, lexicographic
//! - IDs bootstrap..next_id: merged tokens in the order they were learned

use std::collections::{BTreeSet, HashMap};

use crate::fidel::{self, EOW, UNK};

/// A learned merge: `left + right → merged` with its priority rank.
///
/// Rank 1 is the first merge learned and wins over every later one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRule {
    pub left: String,
    pub right: String,
    pub merged: String,
    pub rank: u32,
}

/// Token weights, merge ranks and the token ↔ ID bijection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocab {
    /// Token → merge frequency at the time it was learned (0 for base units)
    pub(crate) weights: HashMap<String, u64>,

    /// Merged token → rank (1-based)
    pub(crate) merge_ranks: HashMap<String, u32>,

    /// Token → dense ID
    pub(crate) token_to_id: HashMap<String, u32>,

    /// Dense ID → token; its length is the next ID to assign
    pub(crate) id_to_token: Vec<String>,
}

impl Vocab {
    /// Create a vocabulary holding only the bootstrap tokens.
    pub fn new() -> Self {
        let mut initial: BTreeSet<String> = fidel::table().base_units();
        initial.insert(EOW.to_string());
        initial.insert(UNK.to_string());

        let mut vocab = Vocab {
            weights: HashMap::with_capacity(initial.len()),
            merge_ranks: HashMap::new(),
            token_to_id: HashMap::with_capacity(initial.len()),
            id_to_token: Vec::with_capacity(initial.len()),
        };

        for token in initial {
            vocab.weights.insert(token.clone(), 0);
            vocab.register(token);
        }

        vocab
    }

    /// Number of tokens the bootstrap inserts for the built-in table.
    pub fn bootstrap_size() -> usize {
        // base units + <eow> + <unk>
        fidel::table().base_units().len() + 2
    }

    /// Current number of tokens.
    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    /// Whether the vocabulary is empty (it never is after bootstrap).
    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    /// The ID the next new token will receive.
    pub fn next_id(&self) -> u32 {
        self.id_to_token.len() as u32
    }

    /// Number of merge ranks assigned so far.
    pub fn merge_count(&self) -> usize {
        self.merge_ranks.len()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.weights.contains_key(token)
    }

    /// Recorded frequency of `token`.
    pub fn weight(&self, token: &str) -> Option<u64> {
        self.weights.get(token).copied()
    }

    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    pub fn token_of(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).map(String::as_str)
    }

    /// Merge rank of a merged token; base units have none.
    pub fn rank_of(&self, token: &str) -> Option<u32> {
        self.merge_ranks.get(token).copied()
    }

    /// ID of the `<unk>` marker.
    pub fn unk_id(&self) -> u32 {
        // Present from bootstrap; load rejects states without it.
        self.token_to_id[UNK]
    }

    /// Record a merge producing `merged`.
    ///
    /// A token that is already known keeps its ID, weight and rank, and
    /// `None` is returned. Otherwise the token gets the next rank and ID.
    pub fn add_merge(&mut self, merged: &str, weight: u64) -> Option<u32> {
        if self.weights.contains_key(merged) {
            return None;
        }

        let rank = self.merge_ranks.len() as u32 + 1;
        self.merge_ranks.insert(merged.to_string(), rank);
        self.weights.insert(merged.to_string(), weight);
        self.register(merged.to_string());

        Some(rank)
    }

    fn register(&mut self, token: String) {
        if !self.token_to_id.contains_key(&token) {
            self.token_to_id.insert(token.clone(), self.next_id());
            self.id_to_token.push(token);
        }
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace non-overlapping `left right` occurrences with `merged`, left to right.
///
/// Training rewrites interned symbol IDs and inference rewrites token
/// strings; both go through this.
pub(crate) fn merge_pair<T: PartialEq + Clone>(
    symbols: &[T],
    left: &T,
    right: &T,
    merged: &T,
) -> Vec<T> {
    let mut out = Vec::with_capacity(symbols.len());
    let mut i = 0;

    while i < symbols.len() {
        if i + 1 < symbols.len() && symbols[i] == *left && symbols[i + 1] == *right {
            out.push(merged.clone());
            i += 2;
        } else {
            out.push(symbols[i].clone());
            i += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_contains_units_and_markers() {
        let vocab = Vocab::new();
        assert_eq!(vocab.len(), Vocab::bootstrap_size());
        assert!(vocab.contains(EOW));
        assert!(vocab.contains(UNK));
        assert!(vocab.contains("ል"));
        assert!(vocab.contains("ʷ"));
        assert_eq!(vocab.merge_count(), 0);
    }

    #[test]
    fn test_bootstrap_ids_are_sorted() {
        let vocab = Vocab::new();
        let tokens: Vec<&str> = (0..vocab.next_id())
            .map(|id| vocab.token_of(id).unwrap())
            .collect();
        let mut sorted = tokens.clone();
        sorted.sort();
        assert_eq!(tokens, sorted);
        // ASCII markers sort ahead of the Ethiopic units
        assert_eq!(vocab.id_of(EOW), Some(0));
        assert_eq!(vocab.id_of(UNK), Some(1));
    }

    #[test]
    fn test_bootstrap_is_reproducible() {
        assert_eq!(Vocab::new(), Vocab::new());
    }

    #[test]
    fn test_add_merge() {
        let mut vocab = Vocab::new();
        let base = vocab.next_id();

        assert_eq!(vocab.add_merge("ልአ", 3), Some(1));
        assert_eq!(vocab.id_of("ልአ"), Some(base));
        assert_eq!(vocab.weight("ልአ"), Some(3));

        assert_eq!(vocab.add_merge("ልአልአ", 2), Some(2));
        assert_eq!(vocab.next_id(), base + 2);
        assert_eq!(vocab.rank_of("ልአልአ"), Some(2));
    }

    #[test]
    fn test_add_known_token_is_noop() {
        let mut vocab = Vocab::new();
        vocab.add_merge("ልአ", 3);
        let before = vocab.clone();

        assert_eq!(vocab.add_merge("ልአ", 9), None);
        assert_eq!(vocab.add_merge("ል", 9), None);
        assert_eq!(vocab, before);
    }

    #[test]
    fn test_merge_pair_is_non_overlapping() {
        assert_eq!(merge_pair(&[1, 1, 1], &1, &1, &9), vec![9, 1]);
        assert_eq!(merge_pair(&[1, 1, 1, 1], &1, &1, &9), vec![9, 9]);
        assert_eq!(merge_pair(&[2, 1, 2], &1, &1, &9), vec![2, 1, 2]);

        let tokens: Vec<String> = ["a", "a", "a", "b"].map(String::from).to_vec();
        let (a, aa) = ("a".to_string(), "aa".to_string());
        assert_eq!(merge_pair(&tokens, &a, &a, &aa), vec!["aa", "a", "b"]);
    }

    #[test]
    fn test_unknown_lookups() {
        let vocab = Vocab::new();
        assert_eq!(vocab.id_of("xyz"), None);
        assert_eq!(vocab.token_of(u32::MAX), None);
        assert_eq!(vocab.rank_of("ል"), None);
        assert_eq!(vocab.token_of(vocab.unk_id()), Some(UNK));
    }
}
