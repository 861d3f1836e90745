mod features;

use std::io::Cursor;
use std::sync::Arc;

use ngram_core::{BackoffModel, ModelOptions, Phrase};

use crate::NgramScorer;

pub(super) const TOY_ARPA: &str = "\\data\\
ngram 1=5
ngram 2=5

\\1-grams:
-99 <s> -0.5
-1.0 a -0.3
-1.2 b -0.2
-1.5 c -0.1
-0.8 </s>

\\2-grams:
-0.2 <s> a
-0.3 a b
-0.4 b c
-0.1 c </s>
-0.6 b a

\\end\\
";

/// A trigram model over the same vocabulary as `TOY_ARPA`.
pub(super) const TRIGRAM_ARPA: &str = "\\data\\
ngram 1=5
ngram 2=3
ngram 3=1

\\1-grams:
-99 <s> -0.5
-1.0 a -0.3
-1.2 b -0.2
-1.5 c -0.1
-0.8 </s>

\\2-grams:
-0.2 <s> a -0.1
-0.3 a b -0.2
-0.4 b c

\\3-grams:
-0.05 <s> a b

\\end\\
";

pub(super) fn trigram_model() -> Arc<BackoffModel> {
    Arc::new(
        BackoffModel::from_arpa(
            Cursor::new(TRIGRAM_ARPA),
            "trigram.arpa",
            3,
            ModelOptions::default(),
        )
        .unwrap(),
    )
}

pub(super) fn toy_model() -> Arc<BackoffModel> {
    Arc::new(
        BackoffModel::from_arpa(Cursor::new(TOY_ARPA), "toy.arpa", 2, ModelOptions::default())
            .unwrap(),
    )
}

pub(super) fn make_scorer() -> NgramScorer<Arc<BackoffModel>> {
    NgramScorer::with_cache_capacity(toy_model(), 64)
}

pub(super) fn phrase(text: &str) -> Phrase {
    Phrase::from_text(text)
}

pub(super) fn assert_close(got: f32, expected: f32) {
    assert!(
        (got - expected).abs() < 1e-5,
        "expected {expected}, got {got}"
    );
}
