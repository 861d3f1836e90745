//! Per-n-gram linear interpolation of several models.

use crate::error::{validate_weights, WeightsError};
use crate::model::{sequence_log_prob, LanguageModel, Scratch};
use crate::numeric::{rank_order_centroid_weights, to_log_prob, to_prob};
use crate::symbol::Symbol;
use crate::word::Word;

/// Mixes component models in probability space at every n-gram:
/// `log10(sum_j w_j * 10^lp_j)`, with `LOG_ZERO` components contributing 0.
pub struct LinearInterpolation {
    models: Vec<Box<dyn LanguageModel>>,
    weights: Vec<f64>,
    /// Whether each component contributes n-gram count features.
    ngram_features: Vec<bool>,
    order: usize,
}

impl LinearInterpolation {
    /// Rank order centroid weights, the first model weighted highest.
    pub fn new(models: Vec<Box<dyn LanguageModel>>) -> Result<Self, WeightsError> {
        let weights = rank_order_centroid_weights(models.len());
        Self::with_weights(models, weights)
    }

    pub fn with_weights(
        models: Vec<Box<dyn LanguageModel>>,
        weights: Vec<f64>,
    ) -> Result<Self, WeightsError> {
        validate_weights(&weights, models.len())?;
        let order = models.iter().map(|m| m.order()).max().unwrap_or(0);
        let ngram_features = vec![true; models.len()];
        Ok(Self {
            models,
            weights,
            ngram_features,
            order,
        })
    }

    /// Turn n-gram count features on or off for component `index`.
    /// Out of range indices are ignored.
    pub fn set_ngram_features(&mut self, index: usize, on: bool) {
        if let Some(flag) = self.ngram_features.get_mut(index) {
            *flag = on;
        }
    }

    pub fn ngram_features(&self) -> &[bool] {
        &self.ngram_features
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn models(&self) -> &[Box<dyn LanguageModel>] {
        &self.models
    }
}

impl LanguageModel for LinearInterpolation {
    fn order(&self) -> usize {
        self.order
    }

    /// Open if any component is.
    fn is_open_vocabulary(&self) -> bool {
        self.models.iter().any(|m| m.is_open_vocabulary())
    }

    fn new_scratch(&self) -> Scratch {
        let mut scratch = Scratch::default();
        scratch.parts = self.models.iter().map(|m| m.new_scratch()).collect();
        scratch
    }

    fn prepare(&self, words: &[Word], scratch: &mut Scratch) {
        scratch.ensure_parts(self.models.len());
        for (model, part) in self.models.iter().zip(&mut scratch.parts) {
            model.prepare(words, part);
        }
    }

    fn log_prob_from_ngram(
        &self,
        words: &[Word],
        scratch: &mut Scratch,
        start: usize,
        order: usize,
    ) -> f32 {
        let mut prob = 0.0f64;
        for ((model, part), weight) in self
            .models
            .iter()
            .zip(&mut scratch.parts)
            .zip(&self.weights)
        {
            // a component of lower order sees only its own window
            let n = order.min(model.order());
            let lp = model.log_prob_from_ngram(words, part, start + order - n, n);
            prob += to_prob(lp as f64) * weight;
        }
        to_log_prob(prob) as f32
    }

    fn for_each_ngram(
        &self,
        words: &[Word],
        scratch: &mut Scratch,
        start: usize,
        order: usize,
        visit: &mut dyn FnMut(&[Symbol]),
    ) {
        // each n-gram is emitted at most once per component; components of
        // lower order have no n-gram of this length to offer
        for ((model, part), &on) in self
            .models
            .iter()
            .zip(&mut scratch.parts)
            .zip(&self.ngram_features)
        {
            if on && order <= model.order() {
                model.for_each_ngram(words, part, start, order, visit);
            }
        }
    }

    /// `$ngram0`, `$ngram1`, ...: each component's own sequence log prob.
    fn log_prob_features(&self, words: &[Word], scratch: &mut Scratch, out: &mut Vec<(String, f32)>) {
        for (j, (model, part)) in self.models.iter().zip(&mut scratch.parts).enumerate() {
            let lp = sequence_log_prob(model.as_ref(), words, part, 0);
            out.push((format!("$ngram{j}"), lp));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backoff::{BackoffModel, ModelOptions};
    use crate::numeric::LOG_ZERO;
    use crate::trie::{BackoffTrie, NgramEntry};

    fn bigram_model(entries: &[(&str, f32, f32)]) -> BackoffModel {
        let mut trie = BackoffTrie::new(2);
        for &(ngram, lp, bo) in entries {
            let keys: Vec<Symbol> = ngram.split_whitespace().map(Symbol::intern).collect();
            trie.insert_path(&keys, NgramEntry::new(lp, bo)).unwrap();
        }
        BackoffModel::new(trie, 2, ModelOptions::default()).unwrap()
    }

    fn words(text: &str) -> Vec<Word> {
        text.split_whitespace().map(Word::new).collect()
    }

    fn model_of(order: usize, entries: &[(&str, f32, f32)]) -> BackoffModel {
        let mut trie = BackoffTrie::new(order);
        for &(ngram, lp, bo) in entries {
            let keys: Vec<Symbol> = ngram.split_whitespace().map(Symbol::intern).collect();
            trie.insert_path(&keys, NgramEntry::new(lp, bo)).unwrap();
        }
        BackoffModel::new(trie, order, ModelOptions::default()).unwrap()
    }

    const MIXED: &[(&str, f32, f32)] = &[
        ("a", -0.5, -0.2),
        ("b", -0.8, -0.1),
        ("c", -1.0, 0.0),
        ("a b", -0.3, -0.1),
        ("b c", -0.4, 0.0),
        ("a b c", -0.2, 0.0),
    ];

    fn trigram_and_bigram() -> LinearInterpolation {
        LinearInterpolation::with_weights(
            vec![Box::new(model_of(3, MIXED)), Box::new(model_of(2, MIXED))],
            vec![0.5, 0.5],
        )
        .unwrap()
    }

    fn toy() -> Arc<BackoffModel> {
        Arc::new(bigram_model(&[
            ("a", -0.5, -0.2),
            ("b", -0.8, 0.0),
            ("a b", -0.3, 0.0),
        ]))
    }

    #[test]
    fn identical_components_are_a_no_op() {
        let model = toy();
        let combo = LinearInterpolation::with_weights(
            vec![Box::new(Arc::clone(&model)), Box::new(Arc::clone(&model))],
            vec![0.5, 0.5],
        )
        .unwrap();
        let ws = words("a b a");
        let mut single = model.new_scratch();
        model.prepare(&ws, &mut single);
        let mut mixed = combo.new_scratch();
        combo.prepare(&ws, &mut mixed);
        for i in 0..ws.len() {
            let n = 2.min(i + 1);
            let expected = model.log_prob_from_ngram(&ws, &mut single, i + 1 - n, n);
            let got = combo.log_prob_from_ngram(&ws, &mut mixed, i + 1 - n, n);
            assert!((expected - got).abs() < 1e-5, "position {i}: {expected} vs {got}");
        }
    }

    #[test]
    fn mixes_in_probability_space() {
        let first = bigram_model(&[("x", -1.0, 0.0)]);
        let second = bigram_model(&[("x", -2.0, 0.0)]);
        let combo = LinearInterpolation::with_weights(
            vec![Box::new(first), Box::new(second)],
            vec![0.75, 0.25],
        )
        .unwrap();
        let ws = words("x");
        let mut scratch = combo.new_scratch();
        combo.prepare(&ws, &mut scratch);
        let expected = (0.75f64 * 0.1 + 0.25 * 0.01).log10() as f32;
        let got = combo.log_prob_from_ngram(&ws, &mut scratch, 0, 1);
        assert!((expected - got).abs() < 1e-6);
    }

    #[test]
    fn zero_everywhere_stays_log_zero() {
        let combo = LinearInterpolation::new(vec![Box::new(toy()), Box::new(toy())]).unwrap();
        let ws = words("unseen");
        let mut scratch = combo.new_scratch();
        combo.prepare(&ws, &mut scratch);
        assert_eq!(combo.log_prob_from_ngram(&ws, &mut scratch, 0, 1), LOG_ZERO);
    }

    #[test]
    fn default_weights_and_validation() {
        let combo = LinearInterpolation::new(vec![Box::new(toy()), Box::new(toy())]).unwrap();
        assert_eq!(combo.weights(), &[0.75, 0.25]);
        assert_eq!(combo.order(), 2);

        assert!(matches!(
            LinearInterpolation::with_weights(vec![Box::new(toy())], vec![0.5, 0.5]),
            Err(WeightsError::CountMismatch { expected: 1, got: 2 })
        ));
        assert!(matches!(
            LinearInterpolation::with_weights(vec![Box::new(toy())], vec![-1.0]),
            Err(WeightsError::Invalid { .. })
        ));
        assert!(matches!(
            LinearInterpolation::new(Vec::new()),
            Err(WeightsError::Empty)
        ));
    }

    #[test]
    fn component_log_prob_features() {
        let combo = LinearInterpolation::new(vec![Box::new(toy()), Box::new(toy())]).unwrap();
        let ws = words("a b");
        let mut scratch = combo.new_scratch();
        combo.prepare(&ws, &mut scratch);
        let mut out = Vec::new();
        combo.log_prob_features(&ws, &mut scratch, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, "$ngram0");
        assert_eq!(out[1].0, "$ngram1");
        assert!((out[0].1 - (-0.8)).abs() < 1e-6);
    }

    #[test]
    fn feature_ngrams_come_from_every_component() {
        let combo = LinearInterpolation::new(vec![Box::new(toy()), Box::new(toy())]).unwrap();
        let ws = words("a b");
        let mut scratch = combo.new_scratch();
        combo.prepare(&ws, &mut scratch);
        let mut count = 0;
        combo.for_each_ngram(&ws, &mut scratch, 0, 2, &mut |keys| {
            assert_eq!(keys.len(), 2);
            count += 1;
        });
        assert_eq!(count, 2);
    }

    fn ngram_counts(combo: &LinearInterpolation, text: &str) -> Vec<(String, usize)> {
        let ws = words(text);
        let mut scratch = combo.new_scratch();
        combo.prepare(&ws, &mut scratch);
        let mut counts: Vec<(String, usize)> = Vec::new();
        for k in 1..=combo.order() {
            for i in 0..=ws.len().saturating_sub(k) {
                combo.for_each_ngram(&ws, &mut scratch, i, k, &mut |keys| {
                    let name = keys.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(":");
                    match counts.iter_mut().find(|(n, _)| *n == name) {
                        Some((_, c)) => *c += 1,
                        None => counts.push((name, 1)),
                    }
                });
            }
        }
        counts.sort();
        counts
    }

    #[test]
    fn mixed_orders_emit_each_ngram_once_per_component() {
        let combo = trigram_and_bigram();
        assert_eq!(combo.order(), 3);
        let counts = ngram_counts(&combo, "a b c");
        let expected: Vec<(String, usize)> = [
            ("a", 2),
            ("a:b", 2),
            ("a:b:c", 1),
            ("b", 2),
            ("b:c", 2),
            ("c", 2),
        ]
        .iter()
        .map(|&(n, c)| (n.to_string(), c))
        .collect();
        assert_eq!(counts, expected);
    }

    #[test]
    fn components_can_opt_out_of_ngram_features() {
        let mut combo = trigram_and_bigram();
        combo.set_ngram_features(1, false);
        combo.set_ngram_features(7, false);
        assert_eq!(combo.ngram_features(), &[true, false]);
        let counts = ngram_counts(&combo, "a b c");
        assert!(counts.iter().all(|(_, c)| *c == 1), "{counts:?}");
        assert_eq!(counts.len(), 6);
    }

    #[test]
    fn mixed_orders_clamp_each_component_window() {
        let combo = trigram_and_bigram();
        let ws = words("a b c");
        let mut scratch = combo.new_scratch();
        combo.prepare(&ws, &mut scratch);
        // trigram sees a b c, bigram sees b c
        let expected = (0.5f64 * 10f64.powf(-0.2) + 0.5 * 10f64.powf(-0.4)).log10() as f32;
        let got = combo.log_prob_from_ngram(&ws, &mut scratch, 0, 3);
        assert!((expected - got).abs() < 1e-6, "{expected} vs {got}");
        let total = sequence_log_prob(&combo, &ws, &mut scratch, 0);
        let first = (0.5f64 * 10f64.powf(-0.5) * 2.0).log10() as f32;
        let second = -0.3f32;
        assert!((total - (first + second + expected)).abs() < 1e-5, "{total}");
    }
}
