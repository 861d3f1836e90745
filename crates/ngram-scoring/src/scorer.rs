//! The phrase scoring contract and the n-gram scorer behind it.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use ngram_core::numeric::{to_log_prob, to_prob};
use ngram_core::settings::settings;
use ngram_core::{
    sequence_log_prob, LanguageModel, NgramFilter, Phrase, Scratch, Symbol, Word, LOG_ZERO,
};
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use tracing::{debug, debug_span};

use crate::features::{Alphabet, FeatureExtractor, FeatureMap};

/// Scores phrases as probabilities in `[0, 1]`.
///
/// `complete` marks a phrase that spans the whole sentence, so sentence
/// boundary markers apply.
pub trait Scorer: Send + Sync {
    fn score(&self, phrase: &Phrase, complete: bool) -> f64;

    /// Base 10 log of `score`; `LOG_ZERO` for a zero score.
    fn log_score(&self, phrase: &Phrase, complete: bool) -> f64 {
        to_log_prob(self.score(phrase, complete))
    }

    /// Score phrases right to left from now on.
    fn set_reverse(&mut self, _reverse: bool) {}

    /// Register a filter that vetoes whole word sequences. Returns false
    /// when the scorer does not filter, in which case `filter` is dropped.
    fn add_filter(&mut self, _filter: Box<dyn NgramFilter>) -> bool {
        false
    }

    fn as_feature_extractor(&self) -> Option<&dyn FeatureExtractor> {
        None
    }

    fn as_feature_extractor_mut(&mut self) -> Option<&mut dyn FeatureExtractor> {
        None
    }
}

/// Name of the whole-phrase log prob feature.
pub const LOG_PROB_FEATURE: &str = "$ngram";

/// Per-call state. Only touched with the scorer's lock held.
struct State {
    scratch: Scratch,
    /// The phrase's words, reversed and delimited as configured.
    words: Vec<Word>,
    /// Whether `words` got sentence markers the phrase did not carry.
    tags_added: bool,
    /// Log probs of previously scored word sequences, by content hash.
    cache: LruCache<u64, f32>,
    positions_scored: u64,
}

/// Scores phrases with a `LanguageModel`, reusing cached prefix scores.
///
/// All scoring entry points take `&self`; calls on one scorer are
/// serialized by an internal lock, while distinct scorers run in parallel.
pub struct NgramScorer<M> {
    model: M,
    reverse: bool,
    filters: Vec<Box<dyn NgramFilter>>,
    alphabet: Option<Arc<dyn Alphabet>>,
    ngram_features: bool,
    log_prob_feature: bool,
    debug: bool,
    state: Mutex<State>,
}

fn words_key(words: &[Word]) -> u64 {
    let mut hasher = FxHasher::default();
    words.hash(&mut hasher);
    hasher.finish()
}

/// Copy `words` into `out`, reversed when `reverse`, adding sentence
/// markers to a complete phrase. Returns whether any marker was added.
///
/// Reversed phrases drop their own boundary words and always get fresh
/// markers, so `<s>` leads in either direction.
pub(crate) fn delimit_words(
    words: &[Word],
    complete: bool,
    reverse: bool,
    out: &mut Vec<Word>,
) -> bool {
    out.clear();
    let mut tags_added = false;
    let starts = words.first().is_some_and(|w| w.form() == Symbol::START);
    let ends = words.last().is_some_and(|w| w.form() == Symbol::END);
    if complete && (reverse || !starts) {
        out.push(Word::start());
        tags_added = true;
    }
    if reverse {
        out.extend(words.iter().rev().filter(|w| !w.is_boundary()).cloned());
    } else {
        out.extend_from_slice(words);
    }
    if complete && (reverse || !ends) {
        out.push(Word::end());
        tags_added = true;
    }
    tags_added
}

fn phrase_text(words: &[Word]) -> String {
    words
        .iter()
        .map(|w| w.form().as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

impl<M: LanguageModel> NgramScorer<M> {
    /// Scorer with the cache capacity and feature flags from settings.
    pub fn new(model: M) -> Self {
        Self::with_cache_capacity(model, settings().cache.capacity)
    }

    pub fn with_cache_capacity(model: M, capacity: usize) -> Self {
        let features = &settings().features;
        let scratch = model.new_scratch();
        Self {
            model,
            reverse: false,
            filters: Vec::new(),
            alphabet: None,
            ngram_features: features.ngram_features,
            log_prob_feature: features.log_prob_feature,
            debug: false,
            state: Mutex::new(State {
                scratch,
                words: Vec::new(),
                tags_added: false,
                cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
                positions_scored: 0,
            }),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn order(&self) -> usize {
        self.model.order()
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Switch direction. Filters follow along and cached scores are dropped.
    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
        for filter in &mut self.filters {
            filter.set_reverse(reverse);
        }
        self.state.get_mut().cache.clear();
    }

    pub fn add_filter(&mut self, mut filter: Box<dyn NgramFilter>) {
        filter.set_reverse(self.reverse);
        self.filters.push(filter);
    }

    pub fn set_alphabet(&mut self, alphabet: Arc<dyn Alphabet>) {
        self.alphabet = Some(alphabet);
    }

    /// Whether `extract_features` includes n-gram count features.
    pub fn set_ngram_features(&mut self, ngram_features: bool) {
        self.ngram_features = ngram_features;
    }

    /// Whether `extract_log_probs` includes the `$ngram` feature.
    pub fn set_log_prob_feature(&mut self, log_prob_feature: bool) {
        self.log_prob_feature = log_prob_feature;
    }

    /// Log every scored phrase at debug level.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Total number of positions walked by the scoring loop so far.
    pub fn positions_scored(&self) -> u64 {
        self.state.lock().positions_scored
    }

    pub fn clear_cache(&self) {
        self.state.lock().cache.clear();
    }

    /// Base 10 log prob of `phrase`.
    ///
    /// An incomplete phrase seen before is answered from the cache. When no
    /// markers had to be added, the cached score of the phrase's first input
    /// (last when reversed) stands in for its words, and only the rest is
    /// walked; the result is cached under the phrase's own words.
    pub fn log_prob(&self, phrase: &Phrase, complete: bool) -> f32 {
        let words = phrase.words();
        if words.is_empty() {
            return 0.0;
        }
        let _span = debug_span!("log_prob", len = words.len(), complete).entered();
        let key = words_key(words);
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !complete {
            if let Some(&log_prob) = state.cache.get(&key) {
                return log_prob;
            }
        }

        self.set_words(state, words, complete);
        if self.filters.iter().any(|f| f.filter_out(&state.words)) {
            if self.debug {
                debug!(words = %phrase_text(&state.words), "filtered out");
            }
            return LOG_ZERO;
        }

        let mut total = 0.0f32;
        let mut num_cached = 0;
        if !state.tags_added {
            let initial = if self.reverse {
                phrase.inputs().last()
            } else {
                phrase.inputs().first()
            };
            if let Some(initial) = initial {
                if let Some(&log_prob) = state.cache.get(&words_key(initial)) {
                    total = log_prob;
                    num_cached = initial.len();
                }
            }
        }
        total += self.walk(state, num_cached);
        if !state.tags_added {
            state.cache.put(key, total);
        }
        if self.debug {
            debug!(words = %phrase_text(&state.words), log_prob = total, num_cached, "scored");
        }
        total
    }

    /// Log prob of `words` as given: no cache, no filters, no markers added.
    pub fn log_prob_words(&self, words: &[Word]) -> f32 {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        self.set_words(state, words, false);
        self.walk(state, 0)
    }

    /// Probability of `words` as given; see `log_prob_words`.
    pub fn score_words(&self, words: &[Word]) -> f64 {
        to_prob(self.log_prob_words(words) as f64)
    }

    /// Counts of every n-gram of every order up to the model's, indexed by
    /// the alphabet. Empty without an alphabet.
    pub fn extract_feature_map(&self, phrase: &Phrase, complete: bool) -> FeatureMap {
        let mut map = FeatureMap::new();
        let Some(alphabet) = self.alphabet.as_deref() else {
            return map;
        };
        if phrase.is_empty() {
            return map;
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;
        self.set_words(state, phrase.words(), complete);
        let State { scratch, words, .. } = state;
        for k in 1..=self.model.order() {
            if words.len() < k {
                continue;
            }
            for i in 0..=words.len() - k {
                self.model.for_each_ngram(words, scratch, i, k, &mut |keys| {
                    if let Some(feature) = alphabet.index(keys) {
                        map.inc(feature);
                    }
                });
            }
        }
        map
    }

    /// The `$ngram` log prob feature plus any named per-component log
    /// probs the model reports.
    pub fn extract_log_probs(&self, phrase: &Phrase, complete: bool) -> FeatureMap {
        let mut map = FeatureMap::new();
        let Some(alphabet) = self.alphabet.as_deref() else {
            return map;
        };
        if self.log_prob_feature {
            if let Some(feature) = alphabet.index_name(LOG_PROB_FEATURE) {
                map.add(feature, self.log_prob(phrase, complete));
            }
        }
        if phrase.is_empty() {
            return map;
        }
        let mut named = Vec::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            self.set_words(state, phrase.words(), complete);
            self.model
                .log_prob_features(&state.words, &mut state.scratch, &mut named);
        }
        for (name, log_prob) in named {
            if let Some(feature) = alphabet.index_name(&name) {
                map.add(feature, log_prob);
            }
        }
        map
    }

    /// Log prob features, plus n-gram counts when enabled.
    pub fn extract_features(&self, phrase: &Phrase, complete: bool) -> FeatureMap {
        let mut map = self.extract_log_probs(phrase, complete);
        if self.ngram_features {
            map.merge(&self.extract_feature_map(phrase, complete));
        }
        map
    }

    /// Fill `state.words` from `words`, reversing and adding sentence
    /// markers as configured, and prepare the model's scratch.
    fn set_words(&self, state: &mut State, words: &[Word], complete: bool) {
        state.tags_added = delimit_words(words, complete, self.reverse, &mut state.words);
        self.model.prepare(&state.words, &mut state.scratch);
    }

    fn walk(&self, state: &mut State, from: usize) -> f32 {
        state.positions_scored += state.words.len().saturating_sub(from) as u64;
        sequence_log_prob(&self.model, &state.words, &mut state.scratch, from)
    }
}

impl<M: LanguageModel> Scorer for NgramScorer<M> {
    fn score(&self, phrase: &Phrase, complete: bool) -> f64 {
        to_prob(self.log_prob(phrase, complete) as f64)
    }

    fn log_score(&self, phrase: &Phrase, complete: bool) -> f64 {
        self.log_prob(phrase, complete) as f64
    }

    fn set_reverse(&mut self, reverse: bool) {
        NgramScorer::set_reverse(self, reverse);
    }

    fn add_filter(&mut self, filter: Box<dyn NgramFilter>) -> bool {
        NgramScorer::add_filter(self, filter);
        true
    }

    fn as_feature_extractor(&self) -> Option<&dyn FeatureExtractor> {
        Some(self)
    }

    fn as_feature_extractor_mut(&mut self) -> Option<&mut dyn FeatureExtractor> {
        Some(self)
    }
}

impl<M: LanguageModel> FeatureExtractor for NgramScorer<M> {
    fn extract_features(&self, phrase: &Phrase, complete: bool) -> FeatureMap {
        NgramScorer::extract_features(self, phrase, complete)
    }

    fn set_alphabet(&mut self, alphabet: Arc<dyn Alphabet>) {
        NgramScorer::set_alphabet(self, alphabet);
    }
}
