//! Recursive backoff over a `BackoffTrie`, and the plain word n-gram model.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::LoadError;
use crate::model::{sem_class_replacement, LanguageModel, Scratch};
use crate::numeric::LOG_ZERO;
use crate::symbol::Symbol;
use crate::trie::BackoffTrie;
use crate::word::{DefaultTokenizer, Tokenizer, Word};

/// Log prob of the last token of `keys` given the ones before it.
///
/// The exact n-gram wins if present. Otherwise the first token is dropped
/// and the context's backoff weight (0 if the context has no entry) is
/// added to the lower-order result, unless that result is already
/// `LOG_ZERO`. A missing unigram is `LOG_ZERO`.
pub fn backoff_log_prob(trie: &BackoffTrie, keys: &[Symbol]) -> f32 {
    if let Some(entry) = trie.entry_at(keys) {
        return entry.log_prob;
    }
    if keys.len() <= 1 {
        return LOG_ZERO;
    }
    let lower = backoff_log_prob(trie, &keys[1..]);
    trace!(order = keys.len() - 1, log_prob = lower, "backed off");
    if lower > LOG_ZERO {
        lower + backoff_weight(trie, &keys[..keys.len() - 1])
    } else {
        lower
    }
}

/// Backoff weight stored for `context`, or 0 if it has no entry.
pub fn backoff_weight(trie: &BackoffTrie, context: &[Symbol]) -> f32 {
    trie.entry_at(context).map_or(0.0, |entry| entry.backoff)
}

/// How words are turned into lookup tokens.
#[derive(Clone)]
pub struct ModelOptions {
    /// Replace forms by their upper-cased sem class when the tokenizer
    /// flags the class.
    pub use_sem_classes: bool,
    pub tokenizer: Arc<dyn Tokenizer>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            use_sem_classes: false,
            tokenizer: Arc::new(DefaultTokenizer::new()),
        }
    }
}

impl ModelOptions {
    pub fn with_sem_classes(mut self, use_sem_classes: bool) -> Self {
        self.use_sem_classes = use_sem_classes;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }
}

impl fmt::Debug for ModelOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelOptions")
            .field("use_sem_classes", &self.use_sem_classes)
            .finish_non_exhaustive()
    }
}

/// A word n-gram model backed by a single trie, typically loaded from an
/// ARPA file.
#[derive(Debug)]
pub struct BackoffModel {
    trie: BackoffTrie,
    order: usize,
    open_vocabulary: bool,
    options: ModelOptions,
}

impl BackoffModel {
    /// Wrap an already built trie. Open vocabulary is derived from the
    /// presence of an `<unk>` unigram.
    pub fn new(trie: BackoffTrie, order: usize, options: ModelOptions) -> Result<Self, LoadError> {
        if order == 0 {
            return Err(LoadError::ZeroOrder);
        }
        let open_vocabulary = trie.has_child(BackoffTrie::ROOT, Symbol::UNKNOWN);
        Ok(Self {
            trie,
            order,
            open_vocabulary,
            options,
        })
    }

    pub fn trie(&self) -> &BackoffTrie {
        &self.trie
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    /// Lookup token for a single word.
    ///
    /// The form (or sem class replacement) gets `_accent` and `_value`
    /// suffixes for a pitch accent and each extra attribute. Tokens the
    /// model never saw at the top level become `<unk>` in an open
    /// vocabulary model.
    pub fn token_for(&self, word: &Word) -> Symbol {
        let base = sem_class_replacement(word, self.options.use_sem_classes, &*self.options.tokenizer)
            .unwrap_or_else(|| word.form());

        let token = if word.pitch_accent().is_some() || !word.attrs().is_empty() {
            let mut text = base.as_str().to_owned();
            if let Some(accent) = word.pitch_accent() {
                text.push('_');
                text.push_str(accent.as_str());
            }
            for (_, val) in word.attrs() {
                text.push('_');
                text.push_str(val.as_str());
            }
            Symbol::intern(&text)
        } else {
            base
        };

        if self.open_vocabulary && !self.trie.has_child(BackoffTrie::ROOT, token) {
            Symbol::UNKNOWN
        } else {
            token
        }
    }
}

impl LanguageModel for BackoffModel {
    fn order(&self) -> usize {
        self.order
    }

    fn is_open_vocabulary(&self) -> bool {
        self.open_vocabulary
    }

    fn prepare(&self, words: &[Word], scratch: &mut Scratch) {
        scratch.keys.clear();
        scratch.keys.extend(words.iter().map(|w| self.token_for(w)));
    }

    fn log_prob_from_ngram(
        &self,
        _words: &[Word],
        scratch: &mut Scratch,
        start: usize,
        order: usize,
    ) -> f32 {
        // the model never predicts the initial <s>
        if start == 0 && order == 1 && scratch.keys.first() == Some(&Symbol::START) {
            return 0.0;
        }
        let keys = &scratch.keys[start..start + order];
        let log_prob = backoff_log_prob(&self.trie, keys);
        trace!(
            word = %keys[order - 1],
            order,
            log_prob,
            "ngram"
        );
        log_prob
    }

    fn for_each_ngram(
        &self,
        words: &[Word],
        scratch: &mut Scratch,
        start: usize,
        order: usize,
        visit: &mut dyn FnMut(&[Symbol]),
    ) {
        if self.log_prob_from_ngram(words, scratch, start, order) == 0.0 {
            return;
        }
        visit(&scratch.keys[start..start + order]);
    }
}
