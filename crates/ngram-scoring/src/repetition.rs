//! Penalizes phrases that repeat content stems.

use ngram_core::settings::settings;
use ngram_core::{Phrase, Symbol, Word};
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::scorer::Scorer;

/// Context turns remembered: the current one plus three older ones.
const CONTEXT_TURNS: usize = 4;

/// Scores a phrase as `10^-(penalty * repeated)`, where `repeated` counts
/// relevant stems already seen earlier in the phrase or in the discourse
/// context.
///
/// A stem repeated within the phrase or from the current context turn
/// counts 1; one from an older turn counts a fraction that shrinks with age.
/// A stem is relevant when its word's part of speech is tracked and the
/// stem itself is not ignored.
#[derive(Debug, Clone)]
pub struct RepetitionScorer {
    penalty: f64,
    /// Count for a repeat from each context turn, current turn first.
    turn_counts: [f64; CONTEXT_TURNS],
    pos_to_use: FxHashSet<Symbol>,
    stems_to_ignore: FxHashSet<Symbol>,
    /// Stems seen per context turn, current turn first.
    context: [FxHashSet<Symbol>; CONTEXT_TURNS],
}

impl Default for RepetitionScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl RepetitionScorer {
    /// Scorer configured from the `repetition` settings.
    pub fn new() -> Self {
        let s = &settings().repetition;
        Self {
            penalty: s.penalty,
            turn_counts: [1.0, s.older_count, s.even_older_count, s.oldest_count],
            pos_to_use: s.pos_to_use.iter().map(|p| Symbol::intern(p)).collect(),
            stems_to_ignore: s.stems_to_ignore.iter().map(|p| Symbol::intern(p)).collect(),
            context: Default::default(),
        }
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn set_penalty(&mut self, penalty: f64) {
        self.penalty = penalty;
    }

    /// Fractional counts for repeats from one, two and three turns back.
    pub fn set_older_counts(&mut self, older: f64, even_older: f64, oldest: f64) {
        self.turn_counts = [1.0, older, even_older, oldest];
    }

    pub fn add_pos(&mut self, pos: &str) {
        self.pos_to_use.insert(Symbol::intern(pos));
    }

    pub fn ignore_stem(&mut self, stem: &str) {
        self.stems_to_ignore.insert(Symbol::intern(stem));
    }

    /// Forget the whole discourse context.
    pub fn reset_context(&mut self) {
        for turn in &mut self.context {
            turn.clear();
        }
    }

    /// Start a new turn: every remembered turn gets one older and the
    /// oldest is forgotten.
    pub fn age_context(&mut self) {
        self.context.rotate_right(1);
        self.context[0].clear();
    }

    /// Remember the relevant stems of `phrase` in the current turn.
    pub fn update_context(&mut self, phrase: &Phrase) {
        for word in phrase.words() {
            if let Some(stem) = self.relevant_stem(word) {
                self.context[0].insert(stem);
            }
        }
    }

    fn relevant_stem(&self, word: &Word) -> Option<Symbol> {
        if !self.pos_to_use.contains(&word.pos()?) {
            return None;
        }
        word.stem().filter(|stem| !self.stems_to_ignore.contains(stem))
    }

    /// Repeat count of one stem, given the stems seen earlier in the phrase.
    fn repeat_count(&self, stem: Symbol, previous: &FxHashSet<Symbol>) -> f64 {
        if previous.contains(&stem) {
            return self.turn_counts[0];
        }
        self.context
            .iter()
            .zip(self.turn_counts)
            .find_map(|(turn, count)| turn.contains(&stem).then_some(count))
            .unwrap_or(0.0)
    }

    /// Repeated relevant stems in `words`, with fractional counts for
    /// repeats from older turns.
    pub fn repeated_items(&self, words: &[Word]) -> f64 {
        let mut previous = FxHashSet::default();
        let mut total = 0.0;
        for stem in words.iter().filter_map(|w| self.relevant_stem(w)) {
            let count = self.repeat_count(stem, &previous);
            if count > 0.0 {
                trace!(%stem, count, "repeated");
            }
            total += count;
            previous.insert(stem);
        }
        total
    }
}

impl Scorer for RepetitionScorer {
    fn score(&self, phrase: &Phrase, _complete: bool) -> f64 {
        10f64.powf(-self.penalty * self.repeated_items(phrase.words()))
    }

    fn log_score(&self, phrase: &Phrase, _complete: bool) -> f64 {
        -self.penalty * self.repeated_items(phrase.words())
    }
}
