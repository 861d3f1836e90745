//! Conditional probability tables stored as order 1 factored families.

use std::path::Path;

use ngram_core::{FactoredModelFamily, LanguageModel, LoadError, ModelOptions, Word};

use crate::scorer::NgramScorer;

/// P(child factors | other factors of the same word), looked up in a
/// factored model family whose parents all sit at offset 0.
pub struct ConditionalProbabilityTable {
    scorer: NgramScorer<FactoredModelFamily>,
}

impl ConditionalProbabilityTable {
    /// Load a table from a factored family spec. Sem class replacement is
    /// never applied.
    pub fn from_spec_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let family = FactoredModelFamily::from_spec_file(path, ModelOptions::default())?;
        if family.order() != 1 {
            return Err(LoadError::OrderMismatch {
                path: path.to_path_buf(),
                expected: 1,
                found: family.order(),
            });
        }
        Ok(Self {
            scorer: NgramScorer::new(family),
        })
    }

    pub fn family(&self) -> &FactoredModelFamily {
        self.scorer.model()
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.scorer.set_debug(debug);
    }

    /// Probability of the attribute/value pairs taken as one word. Pair
    /// order does not matter.
    pub fn score<'a>(&self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> f64 {
        self.scorer.score_words(&[Word::from_attrs(pairs)])
    }

    /// Base 10 log of `score`.
    pub fn log_prob<'a>(&self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> f32 {
        self.scorer.log_prob_words(&[Word::from_attrs(pairs)])
    }
}

/// Split `attr val attr val ...` text into pairs. `None` if a value is
/// missing.
pub fn parse_attr_pairs(text: &str) -> Option<Vec<(&str, &str)>> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() % 2 != 0 {
        return None;
    }
    Some(tokens.chunks(2).map(|pair| (pair[0], pair[1])).collect())
}
