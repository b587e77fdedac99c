//! BPE merge learning over decomposed Fidel.
//!
//! Algorithm:
//! 1. Normalize the corpus and decompose every word into base units + `<eow>`
//! 2. Count adjacent pair frequencies (parallelized with rayon)
//! 3. Merge the most frequent pair, creating a new token
//! 4. Rewrite only the words containing that pair and patch the counts
//! 5. Repeat until the merge budget, the vocabulary ceiling, or the data runs out
//!
//! Ties between equally frequent pairs go to the pair that occurs first when
//! the current words are scanned in first-appearance order, left to right.
//! Training is therefore fully deterministic for a given corpus and config.

use log::{debug, info};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

use crate::fidel;
use crate::vocab::{merge_pair, MergeRule, Vocab};

/// A pair of adjacent symbols.
type Pair = (u32, u32);

/// Configuration for BPE training.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Maximum number of merge iterations
    pub num_merges: usize,
    /// Stop once the vocabulary holds this many tokens
    pub max_vocab_size: Option<usize>,
    /// Log progress every N merges (0 disables)
    pub log_interval: u32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_merges: 50_000,
            max_vocab_size: Some(10_000),
            log_interval: 1000,
        }
    }
}

/// Why the merge loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every iteration of the merge budget was used.
    BudgetExhausted,
    /// The vocabulary reached `max_vocab_size`.
    VocabLimitReached,
    /// The most frequent pair occurs fewer than two times.
    NoRepeatedPair,
    /// No adjacent pairs remain.
    NoPairsLeft,
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Merges that created new tokens, in rank order
    pub merges: Vec<MergeRule>,
    /// Merge iterations performed, including ones that produced a known token
    pub iterations: usize,
    pub stop_reason: StopReason,
}

/// A distinct word of the corpus as a symbol sequence, with its frequency.
#[derive(Debug, Clone)]
struct Word {
    symbols: Vec<u32>,
    count: u64,
}

/// Interned token strings; symbol IDs are local to one training run.
#[derive(Debug, Default)]
struct Symbols {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl Symbols {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    fn name(&self, id: u32) -> &str {
        &self.names[id as usize]
    }
}

/// Working corpus plus incrementally maintained pair statistics.
#[derive(Debug)]
struct MergeState {
    /// Distinct words in first-appearance order
    words: Vec<Word>,
    symbols: Symbols,
    /// Pair → weighted frequency; only positive counts are kept
    pair_counts: HashMap<Pair, u64>,
    /// Pair → indices of words containing it
    pair_words: HashMap<Pair, BTreeSet<usize>>,
}

impl MergeState {
    fn from_text(text: &str) -> Self {
        let table = fidel::table();
        let mut symbols = Symbols::default();
        let mut words: Vec<Word> = Vec::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for word in text.split_whitespace() {
            if let Some(&idx) = seen.get(word) {
                words[idx].count += 1;
                continue;
            }
            let units = table.preprocess_word(word);
            seen.insert(word, words.len());
            words.push(Word {
                symbols: units.iter().map(|u| symbols.intern(u)).collect(),
                count: 1,
            });
        }

        let pair_counts = count_pairs(&words);
        let mut pair_words: HashMap<Pair, BTreeSet<usize>> = HashMap::new();
        for (idx, word) in words.iter().enumerate() {
            for window in word.symbols.windows(2) {
                pair_words
                    .entry((window[0], window[1]))
                    .or_default()
                    .insert(idx);
            }
        }

        Self {
            words,
            symbols,
            pair_counts,
            pair_words,
        }
    }

    /// Most frequent pair, ties broken by earliest occurrence.
    fn best_pair(&self) -> Option<(Pair, u64)> {
        let max = self.pair_counts.values().copied().max()?;
        self.pair_counts
            .iter()
            .filter(|&(_, &count)| count == max)
            .filter_map(|(&pair, _)| self.first_occurrence(pair).map(|pos| (pos, pair)))
            .min()
            .map(|(_, pair)| (pair, max))
    }

    /// `(word index, position)` of the first occurrence of `pair`.
    fn first_occurrence(&self, pair: Pair) -> Option<(usize, usize)> {
        let idx = *self.pair_words.get(&pair)?.first()?;
        let pos = self.words[idx]
            .symbols
            .windows(2)
            .position(|w| (w[0], w[1]) == pair)?;
        Some((idx, pos))
    }

    /// Replace every occurrence of `pair` with `merged` and patch the counts.
    fn apply_merge(&mut self, pair: Pair, merged: u32) {
        let affected: Vec<usize> = self
            .pair_words
            .get(&pair)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        for idx in affected {
            let count = self.words[idx].count;
            let old = std::mem::take(&mut self.words[idx].symbols);
            let new = merge_pair(&old, &pair.0, &pair.1, &merged);

            self.remove_pairs(idx, &old, count);
            self.add_pairs(idx, &new, count);
            self.words[idx].symbols = new;
        }
    }

    fn remove_pairs(&mut self, idx: usize, symbols: &[u32], count: u64) {
        for window in symbols.windows(2) {
            let pair = (window[0], window[1]);
            if let Some(c) = self.pair_counts.get_mut(&pair) {
                *c = c.saturating_sub(count);
                if *c == 0 {
                    self.pair_counts.remove(&pair);
                }
            }
            if let Some(set) = self.pair_words.get_mut(&pair) {
                set.remove(&idx);
                if set.is_empty() {
                    self.pair_words.remove(&pair);
                }
            }
        }
    }

    fn add_pairs(&mut self, idx: usize, symbols: &[u32], count: u64) {
        for window in symbols.windows(2) {
            let pair = (window[0], window[1]);
            *self.pair_counts.entry(pair).or_insert(0) += count;
            self.pair_words.entry(pair).or_default().insert(idx);
        }
    }
}

/// Full pair count over the deduplicated words, weighted by word count.
///
/// Seeds [`MergeState::pair_counts`]; after that the merge loop only patches
/// the words a merge touches.
fn count_pairs(words: &[Word]) -> HashMap<Pair, u64> {
    // per-chunk maps, folded afterwards
    let chunk_counts: Vec<HashMap<Pair, u64>> = words
        .par_chunks(1000)
        .map(|chunk| {
            let mut counts: HashMap<Pair, u64> = HashMap::new();
            for word in chunk {
                for window in word.symbols.windows(2) {
                    *counts.entry((window[0], window[1])).or_insert(0) += word.count;
                }
            }
            counts
        })
        .collect();

    let mut total_counts: HashMap<Pair, u64> = HashMap::new();
    for chunk in chunk_counts {
        for (pair, count) in chunk {
            *total_counts.entry(pair).or_insert(0) += count;
        }
    }

    total_counts
}

/// BPE trainer: learns merge ranks from a corpus into a [`Vocab`].
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Create a new trainer with the given configuration.
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Learn merges from raw text and record them in `vocab`.
    ///
    /// The text is normalized to Ethiopic characters first. Never fails;
    /// an empty or merge-free corpus simply learns nothing.
    pub fn train(&self, vocab: &mut Vocab, corpus: &str) -> TrainOutcome {
        let normalized = fidel::normalize_corpus(corpus);
        let mut state = MergeState::from_text(&normalized);

        info!(
            "Training BPE: {} unique words, {} distinct pairs, budget {} merges",
            state.words.len(),
            state.pair_counts.len(),
            self.config.num_merges
        );

        let mut merges = Vec::new();
        let mut iterations = 0;
        let mut stop_reason = StopReason::BudgetExhausted;

        while iterations < self.config.num_merges {
            if let Some(limit) = self.config.max_vocab_size {
                if vocab.len() >= limit {
                    stop_reason = StopReason::VocabLimitReached;
                    break;
                }
            }

            let Some((pair, count)) = state.best_pair() else {
                stop_reason = StopReason::NoPairsLeft;
                break;
            };
            if count < 2 {
                stop_reason = StopReason::NoRepeatedPair;
                break;
            }

            let left = state.symbols.name(pair.0).to_string();
            let right = state.symbols.name(pair.1).to_string();
            let merged = format!("{left}{right}");

            if let Some(rank) = vocab.add_merge(&merged, count) {
                merges.push(MergeRule {
                    left,
                    right,
                    merged: merged.clone(),
                    rank,
                });
            }

            let merged_id = state.symbols.intern(&merged);
            state.apply_merge(pair, merged_id);
            iterations += 1;

            let interval = self.config.log_interval as usize;
            if interval > 0 && iterations % interval == 0 {
                info!(
                    "  Merge {}/{}: {:?} (freq={}), vocab size = {}",
                    iterations,
                    self.config.num_merges,
                    merged,
                    count,
                    vocab.len()
                );
            }
        }

        debug!("Stopped after {iterations} iterations: {stop_reason:?}");
        info!(
            "Training complete: {} merges learned, vocab size = {}",
            merges.len(),
            vocab.len()
        );

        TrainOutcome {
            merges,
            iterations,
            stop_reason,
        }
    }
}
