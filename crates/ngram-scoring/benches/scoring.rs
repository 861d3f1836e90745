use std::io::Cursor;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ngram_core::{BackoffModel, ModelOptions, Phrase};
use ngram_scoring::NgramScorer;

const VOCAB: usize = 500;

/// A trigram model over `w0 .. w499` where each word usually follows its
/// predecessor.
fn bench_model() -> Arc<BackoffModel> {
    let mut unigrams = vec!["-99 <s> -0.5".to_string(), "-1.5 </s>".to_string()];
    let mut bigrams = Vec::new();
    let mut trigrams = Vec::new();
    for i in 0..VOCAB {
        unigrams.push(format!("-{:.3} w{i} -0.3", 2.0 + (i % 7) as f32 / 10.0));
        bigrams.push(format!("-0.4 w{i} w{} -0.2", (i + 1) % VOCAB));
        if i % 3 == 0 {
            trigrams.push(format!("-0.1 w{i} w{} w{}", (i + 1) % VOCAB, (i + 2) % VOCAB));
        }
    }
    bigrams.push("-0.3 <s> w0 -0.1".to_string());

    let mut arpa = format!(
        "\\data\\\nngram 1={}\nngram 2={}\nngram 3={}\n\n\\1-grams:\n",
        unigrams.len(),
        bigrams.len(),
        trigrams.len()
    );
    for section in [
        (&unigrams, "\n\\2-grams:\n"),
        (&bigrams, "\n\\3-grams:\n"),
        (&trigrams, "\n\\end\\\n"),
    ] {
        for line in section.0 {
            arpa.push_str(line);
            arpa.push('\n');
        }
        arpa.push_str(section.1);
    }
    Arc::new(
        BackoffModel::from_arpa(Cursor::new(arpa), "bench.arpa", 3, ModelOptions::default())
            .expect("bench model"),
    )
}

fn sentence(start: usize, len: usize) -> Phrase {
    Phrase::from_text(
        &(0..len)
            .map(|i| format!("w{}", (start + i) % VOCAB))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

static LENGTHS: &[(&str, usize)] = &[("short", 5), ("medium", 20), ("long", 80)];

fn bench_complete(c: &mut Criterion) {
    let scorer = NgramScorer::new(bench_model());
    let mut group = c.benchmark_group("scoring/complete");
    for &(label, len) in LENGTHS {
        let phrase = sentence(0, len);
        group.bench_with_input(BenchmarkId::new(label, len), &phrase, |b, phrase| {
            b.iter(|| scorer.log_prob(phrase, true));
        });
    }
    group.finish();
}

fn bench_repeat(c: &mut Criterion) {
    let scorer = NgramScorer::new(bench_model());
    let mut group = c.benchmark_group("scoring/repeat");
    for &(label, len) in LENGTHS {
        let phrase = sentence(0, len);
        group.bench_with_input(BenchmarkId::new(label, len), &phrase, |b, phrase| {
            b.iter(|| scorer.log_prob(phrase, false));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("scoring/uncached");
    for &(label, len) in LENGTHS {
        let phrase = sentence(0, len);
        group.bench_with_input(BenchmarkId::new(label, len), &phrase, |b, phrase| {
            b.iter(|| scorer.log_prob_words(phrase.words()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_complete, bench_repeat);
criterion_main!(benches);
