//! The per-n-gram scoring contract shared by every model variant.
//!
//! A `LanguageModel` is immutable once loaded and can be shared across
//! threads. Everything that changes from call to call lives in a `Scratch`
//! owned by the caller, which is cleared and refilled on each `prepare`.

use std::sync::Arc;

use crate::symbol::Symbol;
use crate::word::{Tokenizer, Word};

/// Reusable buffers for one scoring call.
///
/// Composite models keep one child scratch per component in `parts`.
#[derive(Debug, Default)]
pub struct Scratch {
    /// One lookup token per prepared word.
    pub keys: Vec<Symbol>,
    /// The n-gram currently being looked up.
    pub lookup: Vec<Symbol>,
    /// Per-factor token rows, indexed `[factor][position]`.
    pub rows: Vec<Vec<Symbol>>,
    pub parts: Vec<Scratch>,
}

impl Scratch {
    /// Scratch with room for `n` component scratches.
    pub fn with_parts(n: usize) -> Self {
        Self {
            parts: (0..n).map(|_| Scratch::default()).collect(),
            ..Self::default()
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.lookup.clear();
        for row in &mut self.rows {
            row.clear();
        }
        for part in &mut self.parts {
            part.clear();
        }
    }

    /// Make sure `parts` has at least `n` entries.
    pub fn ensure_parts(&mut self, n: usize) {
        if self.parts.len() < n {
            self.parts.resize_with(n, Scratch::default);
        }
    }
}

/// A backoff n-gram model scored one n-gram at a time.
///
/// `words` is the prepared word stream (boundary markers already added,
/// already reversed when scoring in reverse). `prepare` must be called with
/// the same stream before any per-n-gram call.
pub trait LanguageModel: Send + Sync {
    /// Maximum n-gram length consulted.
    fn order(&self) -> usize;

    /// True when the model carries an `<unk>` unigram.
    fn is_open_vocabulary(&self) -> bool;

    fn new_scratch(&self) -> Scratch {
        Scratch::default()
    }

    /// Map the prepared words to lookup tokens.
    fn prepare(&self, words: &[Word], scratch: &mut Scratch);

    /// Log prob (base 10) of the last of the `order` words starting at
    /// `start`, given the ones before it.
    fn log_prob_from_ngram(
        &self,
        words: &[Word],
        scratch: &mut Scratch,
        start: usize,
        order: usize,
    ) -> f32;

    /// Hand the lookup keys of the n-gram at `start` to `visit`, once per
    /// underlying model. N-grams contributing exactly 0 are skipped.
    fn for_each_ngram(
        &self,
        words: &[Word],
        scratch: &mut Scratch,
        start: usize,
        order: usize,
        visit: &mut dyn FnMut(&[Symbol]),
    );

    /// Named whole-sequence log probs beyond the model's own, such as one
    /// per interpolated component.
    fn log_prob_features(
        &self,
        _words: &[Word],
        _scratch: &mut Scratch,
        _out: &mut Vec<(String, f32)>,
    ) {
    }
}

/// Sum per-position log probs from `from` to the end of `words`, using
/// `min(order, i + 1)` words at position `i`.
pub fn sequence_log_prob<M: LanguageModel + ?Sized>(
    model: &M,
    words: &[Word],
    scratch: &mut Scratch,
    from: usize,
) -> f32 {
    let order = model.order();
    let mut total = 0.0f32;
    for i in from..words.len() {
        let n = order.min(i + 1);
        total += model.log_prob_from_ngram(words, scratch, i + 1 - n, n);
    }
    total
}

/// The upper-cased sem class that stands in for `word`'s form, if sem class
/// substitution applies to it.
pub fn sem_class_replacement(
    word: &Word,
    use_sem_classes: bool,
    tokenizer: &dyn Tokenizer,
) -> Option<Symbol> {
    if !use_sem_classes {
        return None;
    }
    let class = word.sem_class()?;
    tokenizer
        .is_replacement_sem_class(class)
        .then(|| Symbol::intern(&class.as_str().to_uppercase()))
}

macro_rules! forward_language_model {
    ($ptr:ident) => {
        impl<M: LanguageModel + ?Sized> LanguageModel for $ptr<M> {
            fn order(&self) -> usize {
                (**self).order()
            }

            fn is_open_vocabulary(&self) -> bool {
                (**self).is_open_vocabulary()
            }

            fn new_scratch(&self) -> Scratch {
                (**self).new_scratch()
            }

            fn prepare(&self, words: &[Word], scratch: &mut Scratch) {
                (**self).prepare(words, scratch)
            }

            fn log_prob_from_ngram(
                &self,
                words: &[Word],
                scratch: &mut Scratch,
                start: usize,
                order: usize,
            ) -> f32 {
                (**self).log_prob_from_ngram(words, scratch, start, order)
            }

            fn for_each_ngram(
                &self,
                words: &[Word],
                scratch: &mut Scratch,
                start: usize,
                order: usize,
                visit: &mut dyn FnMut(&[Symbol]),
            ) {
                (**self).for_each_ngram(words, scratch, start, order, visit)
            }

            fn log_prob_features(
                &self,
                words: &[Word],
                scratch: &mut Scratch,
                out: &mut Vec<(String, f32)>,
            ) {
                (**self).log_prob_features(words, scratch, out)
            }
        }
    };
}

forward_language_model!(Box);
forward_language_model!(Arc);
