//! N-gram precision against a set of target phrases.

use std::sync::Arc;

use ngram_core::error::validate_weights;
use ngram_core::model::sem_class_replacement;
use ngram_core::numeric::rank_order_centroid_weights;
use ngram_core::settings::settings;
use ngram_core::{
    BackoffTrie, DefaultTokenizer, NgramEntry, NgramFilter, Phrase, Symbol, Tokenizer,
    WeightsError, Word,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::features::{Alphabet, FeatureExtractor, FeatureMap};
use crate::scorer::{delimit_words, Scorer};

#[derive(Debug, Default)]
struct Buffers {
    words: Vec<Word>,
    keys: Vec<Symbol>,
}

/// Scores a phrase by how many of its n-grams occur in the target phrases.
///
/// The score is a weighted sum of the unigram through `order`-gram
/// precisions. Phrases shorter than `order` are rescaled by the weights of
/// the orders they can reach, so a short perfect match still scores 1.
///
/// Target n-grams live in a trie, so n-grams sharing a prefix share its
/// nodes.
pub struct NgramPrecisionScorer {
    order: usize,
    /// Weight of each n-gram length, unigrams first.
    weights: Vec<f64>,
    exact_matches: bool,
    use_sem_classes: bool,
    tokenizer: Arc<dyn Tokenizer>,
    reverse: bool,
    filters: Vec<Box<dyn NgramFilter>>,
    alphabet: Option<Arc<dyn Alphabet>>,
    targets: Vec<Phrase>,
    target_ngrams: BackoffTrie,
    buffers: Mutex<Buffers>,
}

impl NgramPrecisionScorer {
    /// Scorer of `precision.order` from settings with rank order centroid
    /// weights.
    pub fn new(targets: &[Phrase]) -> Self {
        let order = settings().precision.order;
        let weights = rank_order_centroid_weights(order).into_iter().rev().collect();
        let mut scorer = Self::build(order, weights);
        scorer.set_targets(targets);
        scorer
    }

    /// `weights` run from the highest order down to unigrams.
    pub fn with_weights(
        targets: &[Phrase],
        order: usize,
        weights: Vec<f64>,
    ) -> Result<Self, WeightsError> {
        validate_weights(&weights, order)?;
        let mut scorer = Self::build(order, weights.into_iter().rev().collect());
        scorer.set_targets(targets);
        Ok(scorer)
    }

    /// Rank order centroid weights for `order`.
    pub fn with_order(targets: &[Phrase], order: usize) -> Result<Self, WeightsError> {
        Self::with_weights(targets, order, rank_order_centroid_weights(order))
    }

    fn build(order: usize, weights: Vec<f64>) -> Self {
        Self {
            order,
            weights,
            exact_matches: false,
            use_sem_classes: false,
            tokenizer: Arc::new(DefaultTokenizer::new()),
            reverse: false,
            filters: Vec::new(),
            alphabet: None,
            targets: Vec::new(),
            target_ngrams: BackoffTrie::new(order),
            buffers: Mutex::new(Buffers::default()),
        }
    }

    /// Compare flagged sem classes instead of word forms, for targets and
    /// scored phrases alike.
    pub fn with_sem_classes(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.use_sem_classes = true;
        self.tokenizer = tokenizer;
        self.rebuild_targets();
        self
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Per-order weights, unigrams first.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// With exact matches on, an order's precision is 1 only when every one
    /// of its n-grams matches, and 0 otherwise.
    pub fn set_exact_matches(&mut self, exact_matches: bool) {
        self.exact_matches = exact_matches;
    }

    pub fn exact_matches(&self) -> bool {
        self.exact_matches
    }

    /// Replace the target phrases. Each is scored as a complete sentence.
    pub fn set_targets(&mut self, targets: &[Phrase]) {
        self.targets = targets.iter().filter(|t| !t.is_empty()).cloned().collect();
        self.rebuild_targets();
    }

    /// Number of distinct target n-grams of every order.
    pub fn target_ngram_count(&self) -> usize {
        self.target_ngrams.entry_count()
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
        for filter in &mut self.filters {
            filter.set_reverse(reverse);
        }
        self.rebuild_targets();
    }

    pub fn add_filter(&mut self, mut filter: Box<dyn NgramFilter>) {
        filter.set_reverse(self.reverse);
        self.filters.push(filter);
    }

    pub fn set_alphabet(&mut self, alphabet: Arc<dyn Alphabet>) {
        self.alphabet = Some(alphabet);
    }

    fn key_for(&self, word: &Word) -> Symbol {
        let base = sem_class_replacement(word, self.use_sem_classes, &*self.tokenizer)
            .unwrap_or_else(|| word.form());
        match word.pitch_accent() {
            Some(accent) => Symbol::intern(&format!("{base}_{accent}")),
            None => base,
        }
    }

    fn rebuild_targets(&mut self) {
        let mut trie = BackoffTrie::new(self.order);
        let mut words = Vec::new();
        for target in &self.targets {
            delimit_words(target.words(), true, self.reverse, &mut words);
            let keys: Vec<Symbol> = words.iter().map(|w| self.key_for(w)).collect();
            for k in 1..=self.order.min(keys.len()) {
                for ngram in keys.windows(k) {
                    let inserted = trie.insert_path(ngram, NgramEntry::new(0.0, 0.0));
                    debug_assert!(inserted.is_ok());
                }
            }
        }
        debug!(
            targets = self.targets.len(),
            ngrams = trie.entry_count(),
            nodes = trie.node_count(),
            "target n-grams"
        );
        self.target_ngrams = trie;
    }

    /// Fill the buffers with the phrase's prepared words and keys. False if
    /// a filter rejects the words.
    fn prepare(&self, buffers: &mut Buffers, phrase: &Phrase, complete: bool) -> bool {
        delimit_words(phrase.words(), complete, self.reverse, &mut buffers.words);
        if self.filters.iter().any(|f| f.filter_out(&buffers.words)) {
            return false;
        }
        buffers.keys.clear();
        buffers.keys.extend(buffers.words.iter().map(|w| self.key_for(w)));
        true
    }

    /// Share of the `k`-grams of `keys` found among the targets; 0 when
    /// `keys` has no `k`-gram.
    fn ngram_precision(&self, keys: &[Symbol], k: usize) -> f64 {
        if keys.len() < k {
            return 0.0;
        }
        let total = keys.len() - k + 1;
        let matches = keys
            .windows(k)
            .filter(|ngram| self.target_ngrams.entry_at(ngram).is_some())
            .count();
        if self.exact_matches {
            if matches == total {
                1.0
            } else {
                0.0
            }
        } else {
            matches as f64 / total as f64
        }
    }

    /// Weighted n-gram precision of `phrase`, 0 for an empty or filtered
    /// phrase.
    pub fn precision(&self, phrase: &Phrase, complete: bool) -> f64 {
        if phrase.is_empty() {
            return 0.0;
        }
        let mut buffers = self.buffers.lock();
        if !self.prepare(&mut buffers, phrase, complete) {
            return 0.0;
        }
        let keys = &buffers.keys;
        let mut score: f64 = (1..=self.order)
            .map(|k| self.weights[k - 1] * self.ngram_precision(keys, k))
            .sum();
        if keys.len() < self.order {
            let reachable: f64 = self.weights[..keys.len()].iter().sum();
            score = if reachable > 0.0 { score / reachable } else { 0.0 };
        }
        score
    }

    /// Counts of every n-gram of the phrase up to `order`, indexed by the
    /// alphabet. Empty without an alphabet.
    pub fn extract_feature_map(&self, phrase: &Phrase, complete: bool) -> FeatureMap {
        let mut map = FeatureMap::new();
        let Some(alphabet) = self.alphabet.as_deref() else {
            return map;
        };
        let mut buffers = self.buffers.lock();
        delimit_words(phrase.words(), complete, self.reverse, &mut buffers.words);
        let keys: Vec<Symbol> = buffers.words.iter().map(|w| self.key_for(w)).collect();
        for k in 1..=self.order.min(keys.len()) {
            for ngram in keys.windows(k) {
                if let Some(feature) = alphabet.index(ngram) {
                    map.inc(feature);
                }
            }
        }
        map
    }
}

impl Scorer for NgramPrecisionScorer {
    fn score(&self, phrase: &Phrase, complete: bool) -> f64 {
        self.precision(phrase, complete)
    }

    fn set_reverse(&mut self, reverse: bool) {
        NgramPrecisionScorer::set_reverse(self, reverse);
    }

    fn add_filter(&mut self, filter: Box<dyn NgramFilter>) -> bool {
        NgramPrecisionScorer::add_filter(self, filter);
        true
    }

    fn as_feature_extractor(&self) -> Option<&dyn FeatureExtractor> {
        Some(self)
    }

    fn as_feature_extractor_mut(&mut self) -> Option<&mut dyn FeatureExtractor> {
        Some(self)
    }
}

impl FeatureExtractor for NgramPrecisionScorer {
    fn extract_features(&self, phrase: &Phrase, complete: bool) -> FeatureMap {
        self.extract_feature_map(phrase, complete)
    }

    fn set_alphabet(&mut self, alphabet: Arc<dyn Alphabet>) {
        NgramPrecisionScorer::set_alphabet(self, alphabet);
    }
}
