//! Whole-phrase combinations of arbitrary scorers.

use std::sync::Arc;

use ngram_core::error::validate_weights;
use ngram_core::{Phrase, WeightsError};

use crate::features::{Alphabet, ComposedFeatureExtractor, FeatureExtractor, FeatureMap};
use crate::scorer::Scorer;

fn set_alphabet_on_all(scorers: &mut [Box<dyn Scorer>], alphabet: Arc<dyn Alphabet>) {
    for scorer in scorers {
        if let Some(extractor) = scorer.as_feature_extractor_mut() {
            extractor.set_alphabet(Arc::clone(&alphabet));
        }
    }
}

/// Weighted sum of component scores.
pub struct ScorerInterpolation {
    scorers: Vec<Box<dyn Scorer>>,
    weights: Vec<f64>,
}

impl ScorerInterpolation {
    /// Equal weights.
    pub fn new(scorers: Vec<Box<dyn Scorer>>) -> Result<Self, WeightsError> {
        let weights = vec![1.0 / scorers.len().max(1) as f64; scorers.len()];
        Self::with_weights(scorers, weights)
    }

    pub fn with_weights(scorers: Vec<Box<dyn Scorer>>, weights: Vec<f64>) -> Result<Self, WeightsError> {
        validate_weights(&weights, scorers.len())?;
        Ok(Self { scorers, weights })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn scorers(&self) -> &[Box<dyn Scorer>] {
        &self.scorers
    }

    /// The components that extract features.
    pub fn composed_feature_extractor(&self) -> ComposedFeatureExtractor<'_> {
        ComposedFeatureExtractor::from_scorers(&self.scorers)
    }
}

impl Scorer for ScorerInterpolation {
    fn score(&self, phrase: &Phrase, complete: bool) -> f64 {
        self.scorers
            .iter()
            .zip(&self.weights)
            .map(|(scorer, weight)| scorer.score(phrase, complete) * weight)
            .sum()
    }

    fn set_reverse(&mut self, reverse: bool) {
        for scorer in &mut self.scorers {
            scorer.set_reverse(reverse);
        }
    }

    fn as_feature_extractor(&self) -> Option<&dyn FeatureExtractor> {
        Some(self)
    }

    fn as_feature_extractor_mut(&mut self) -> Option<&mut dyn FeatureExtractor> {
        Some(self)
    }
}

impl FeatureExtractor for ScorerInterpolation {
    fn extract_features(&self, phrase: &Phrase, complete: bool) -> FeatureMap {
        self.composed_feature_extractor()
            .extract_features(phrase, complete)
    }

    fn set_alphabet(&mut self, alphabet: Arc<dyn Alphabet>) {
        set_alphabet_on_all(&mut self.scorers, alphabet);
    }
}

/// Product of component scores.
pub struct ScorerProduct {
    scorers: Vec<Box<dyn Scorer>>,
}

impl ScorerProduct {
    pub fn new(scorers: Vec<Box<dyn Scorer>>) -> Self {
        Self { scorers }
    }

    pub fn scorers(&self) -> &[Box<dyn Scorer>] {
        &self.scorers
    }

    pub fn composed_feature_extractor(&self) -> ComposedFeatureExtractor<'_> {
        ComposedFeatureExtractor::from_scorers(&self.scorers)
    }
}

impl Scorer for ScorerProduct {
    fn score(&self, phrase: &Phrase, complete: bool) -> f64 {
        self.scorers
            .iter()
            .map(|scorer| scorer.score(phrase, complete))
            .product()
    }

    fn set_reverse(&mut self, reverse: bool) {
        for scorer in &mut self.scorers {
            scorer.set_reverse(reverse);
        }
    }

    fn as_feature_extractor(&self) -> Option<&dyn FeatureExtractor> {
        Some(self)
    }

    fn as_feature_extractor_mut(&mut self) -> Option<&mut dyn FeatureExtractor> {
        Some(self)
    }
}

impl FeatureExtractor for ScorerProduct {
    fn extract_features(&self, phrase: &Phrase, complete: bool) -> FeatureMap {
        self.composed_feature_extractor()
            .extract_features(phrase, complete)
    }

    fn set_alphabet(&mut self, alphabet: Arc<dyn Alphabet>) {
        set_alphabet_on_all(&mut self.scorers, alphabet);
    }
}
