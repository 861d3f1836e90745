//! Phrase scoring on top of the `ngram_core` models.
//!
//! `NgramScorer` owns the mutable side of scoring (prepared word buffers,
//! the prefix cache, filters, feature extraction) behind a lock, so one
//! loaded model can back many scorers. `NgramPrecisionScorer` and
//! `RepetitionScorer` judge phrases against targets and discourse context
//! instead of a model. Whole-phrase combinators mix arbitrary `Scorer`s.

mod combinators;
mod cpt;
mod features;
mod precision;
mod repetition;
mod scorer;

#[cfg(test)]
mod tests;

pub use combinators::{ScorerInterpolation, ScorerProduct};
pub use cpt::{parse_attr_pairs, ConditionalProbabilityTable};
pub use features::{
    feature_name, Alphabet, ComposedFeatureExtractor, FeatureAlphabet, FeatureExtractor,
    FeatureId, FeatureMap,
};
pub use precision::NgramPrecisionScorer;
pub use repetition::RepetitionScorer;
pub use scorer::{NgramScorer, Scorer, LOG_PROB_FEATURE};
