use std::sync::Arc;

use ngram_core::{BackoffModel, LanguageModel, LinearInterpolation};

use super::{assert_close, make_scorer, phrase, toy_model, trigram_model};
use crate::{Alphabet, FeatureAlphabet, FeatureMap, NgramScorer, LOG_PROB_FEATURE};

fn named(alphabet: &FeatureAlphabet, map: &FeatureMap) -> Vec<(String, f32)> {
    let mut out: Vec<(String, f32)> = map
        .iter()
        .map(|(f, v)| (alphabet.name(f).unwrap(), v))
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn with_alphabet() -> (NgramScorer<Arc<BackoffModel>>, Arc<FeatureAlphabet>) {
    let mut scorer = make_scorer();
    let alphabet = Arc::new(FeatureAlphabet::new());
    scorer.set_alphabet(alphabet.clone());
    (scorer, alphabet)
}

#[test]
fn counts_every_order_but_the_initial_start() {
    let (scorer, alphabet) = with_alphabet();
    let map = scorer.extract_feature_map(&phrase("a b"), true);
    let names: Vec<String> = named(&alphabet, &map).into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec!["</s>", "<s>:a", "a", "a:b", "b", "b:</s>"]
    );
    assert!(map.iter().all(|(_, v)| v == 1.0));
}

#[test]
fn repeated_ngrams_accumulate() {
    let (scorer, alphabet) = with_alphabet();
    let map = scorer.extract_feature_map(&phrase("a b a b"), false);
    let ab = alphabet.index_name("a:b").unwrap();
    let a = alphabet.index_name("a").unwrap();
    assert_eq!(map.get(ab), 2.0);
    assert_eq!(map.get(a), 2.0);
}

#[test]
fn unseen_ngrams_are_still_counted_when_nonzero() {
    let (scorer, alphabet) = with_alphabet();
    let map = scorer.extract_feature_map(&phrase("c a"), false);
    // c a backs off to a finite estimate
    let ca = alphabet.index_name("c:a").unwrap();
    assert_eq!(map.get(ca), 1.0);
}

#[test]
fn log_prob_feature_carries_the_score() {
    let (scorer, alphabet) = with_alphabet();
    let p = phrase("a b c");
    let map = scorer.extract_features(&p, true);
    let f = alphabet.index_name(LOG_PROB_FEATURE).unwrap();
    assert_eq!(map.get(f), scorer.log_prob(&p, true));
    assert_eq!(map.iter().next().map(|(id, _)| id), Some(f));
}

#[test]
fn feature_flags() {
    let (mut scorer, alphabet) = with_alphabet();
    let p = phrase("a b");
    scorer.set_ngram_features(false);
    let map = scorer.extract_features(&p, false);
    assert_eq!(named(&alphabet, &map).len(), 1);

    scorer.set_ngram_features(true);
    scorer.set_log_prob_feature(false);
    let map = scorer.extract_features(&p, false);
    let names: Vec<String> = named(&alphabet, &map).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["a", "a:b", "b"]);
}

#[test]
fn closed_alphabet_keeps_only_known_features() {
    let mut scorer = make_scorer();
    let alphabet = Arc::new(FeatureAlphabet::from_names(["a:b", LOG_PROB_FEATURE]));
    scorer.set_alphabet(alphabet.clone());
    let map = scorer.extract_features(&phrase("a b c"), false);
    assert_eq!(map.len(), 2);
    assert_eq!(alphabet.len(), 2);
}

#[test]
fn no_alphabet_no_features() {
    let scorer = make_scorer();
    assert!(scorer.extract_features(&phrase("a b"), true).is_empty());
}

#[test]
fn interpolated_components_get_their_own_features() {
    let combo = LinearInterpolation::new(vec![Box::new(toy_model()), Box::new(toy_model())]).unwrap();
    let mut scorer = NgramScorer::with_cache_capacity(combo, 16);
    let alphabet = Arc::new(FeatureAlphabet::new());
    scorer.set_alphabet(alphabet.clone());
    scorer.set_ngram_features(false);

    let p = phrase("a b c");
    let map = scorer.extract_features(&p, true);
    let single = make_scorer().log_prob(&p, true);
    for name in [LOG_PROB_FEATURE, "$ngram0", "$ngram1"] {
        let f = alphabet.index_name(name).unwrap();
        assert!((map.get(f) - single).abs() < 1e-4, "{name}");
    }
    assert_eq!(scorer.model().order(), 2);
}

fn trigram_and_bigram() -> NgramScorer<LinearInterpolation> {
    let combo = LinearInterpolation::with_weights(
        vec![Box::new(trigram_model()), Box::new(toy_model())],
        vec![0.5, 0.5],
    )
    .unwrap();
    NgramScorer::with_cache_capacity(combo, 16)
}

#[test]
fn mixed_order_interpolation_counts_each_component_once() {
    let mut scorer = trigram_and_bigram();
    let alphabet = Arc::new(FeatureAlphabet::new());
    scorer.set_alphabet(alphabet.clone());
    let map = scorer.extract_feature_map(&phrase("a b c"), false);
    assert_eq!(
        named(&alphabet, &map),
        vec![
            ("a".to_string(), 2.0),
            ("a:b".to_string(), 2.0),
            ("a:b:c".to_string(), 1.0),
            ("b".to_string(), 2.0),
            ("b:c".to_string(), 2.0),
            ("c".to_string(), 2.0),
        ]
    );
}

#[test]
fn mixed_order_interpolation_log_probs() {
    let mut scorer = trigram_and_bigram();
    let alphabet = Arc::new(FeatureAlphabet::new());
    scorer.set_alphabet(alphabet.clone());
    let p = phrase("a b c");

    // c | a b backs off to -0.4 + -0.2 in the trigram, -0.4 in the bigram
    let last = (0.5 * 10f64.powf(-0.6) + 0.5 * 10f64.powf(-0.4)).log10() as f32;
    assert_close(scorer.log_prob(&p, false), -1.3 + last);

    let map = scorer.extract_log_probs(&p, false);
    let get = |name: &str| map.get(alphabet.index_name(name).unwrap());
    assert_close(get(LOG_PROB_FEATURE), -1.3 + last);
    assert_close(get("$ngram0"), -1.9);
    assert_close(get("$ngram1"), -1.7);
}
