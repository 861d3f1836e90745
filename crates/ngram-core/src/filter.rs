//! Filters that veto a prepared word sequence outright.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::symbol::Symbol;
use crate::word::Word;

/// A predicate over a prepared word sequence. A sequence that is filtered
/// out scores as probability zero.
pub trait NgramFilter: Send + Sync {
    fn filter_out(&self, words: &[Word]) -> bool;

    /// Tell the filter that sequences arrive reversed.
    fn set_reverse(&mut self, _reverse: bool) {}
}

/// Rejects "a" before a vowel and "an" before a consonant, judged by the
/// first letter of the next word, unless the pair is a listed exception.
#[derive(Debug, Default)]
pub struct AAnFilter {
    /// `(article, next word)` pairs where the default judgement flips.
    exceptions: FxHashSet<(Symbol, Symbol)>,
    reverse: bool,
}

fn a() -> Symbol {
    Symbol::intern("a")
}

fn an() -> Symbol {
    Symbol::intern("an")
}

fn starts_with_vowel(word: &str) -> bool {
    matches!(
        word.chars().next(),
        Some('a' | 'e' | 'i' | 'o' | 'u' | 'A' | 'E' | 'I' | 'O' | 'U')
    )
}

/// Whether the article/word pair is wrong by the initial-letter rule alone.
fn wrong_by_default(article: Symbol, next: &str) -> bool {
    let vowel = starts_with_vowel(next);
    (article == a() && vowel) || (article == an() && !vowel)
}

impl AAnFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter with exceptions read from a file of `article word` lines.
    pub fn from_exceptions_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut filter = Self::new();
        filter
            .load_exceptions(BufReader::new(file))
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), exceptions = filter.exceptions.len(), "loaded a/an exceptions");
        Ok(filter)
    }

    /// Add every `article word` line of `reader`. Lines with fewer than two
    /// tokens are skipped; tokens past the second are ignored.
    pub fn load_exceptions<R: BufRead>(&mut self, reader: R) -> io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            let mut tokens = line.split_whitespace();
            if let (Some(article), Some(word)) = (tokens.next(), tokens.next()) {
                self.add_exception(article, word);
            }
        }
        Ok(())
    }

    /// Record `article word` as an exception. Returns false, and ignores the
    /// pair, unless `article` is "a" or "an".
    pub fn add_exception(&mut self, article: &str, word: &str) -> bool {
        if article != "a" && article != "an" {
            warn!(article, word, "ignoring a/an exception not starting with a/an");
            return false;
        }
        self.exceptions
            .insert((Symbol::intern(article), Symbol::intern(word)));
        true
    }

    pub fn exception_count(&self) -> usize {
        self.exceptions.len()
    }

    fn is_exception(&self, article: Symbol, next: Symbol) -> bool {
        self.exceptions.contains(&(article, next))
    }

    /// Whether the adjacent pair `first second` (in sequence order) is wrong.
    pub fn filter_out_pair(&self, first: &Word, second: &Word) -> bool {
        let (w1, w2) = if self.reverse {
            (second, first)
        } else {
            (first, second)
        };
        let article = w1.form();
        if article != a() && article != an() {
            return false;
        }
        let alternative = if article == a() { an() } else { a() };
        let next = w2.form();
        let default = wrong_by_default(article, next.as_str());
        if self.is_exception(article, next) || self.is_exception(alternative, next) {
            !default
        } else {
            default
        }
    }

    /// Copy the `a`/`an` bigrams of a bigram list that the initial-letter
    /// rule gets wrong to `out`, as `article word` lines. Returns how many
    /// were written.
    pub fn cull_exceptions<R: BufRead, W: Write>(reader: R, mut out: W) -> io::Result<usize> {
        let mut written = 0;
        for line in reader.lines() {
            let line = line?;
            let mut tokens = line.split_whitespace();
            let (Some(article), Some(word)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            if (article == "a" || article == "an")
                && wrong_by_default(Symbol::intern(article), word)
            {
                writeln!(out, "{article} {word}")?;
                written += 1;
            }
        }
        out.flush()?;
        Ok(written)
    }
}

impl NgramFilter for AAnFilter {
    fn filter_out(&self, words: &[Word]) -> bool {
        words
            .windows(2)
            .any(|pair| self.filter_out_pair(&pair[0], &pair[1]))
    }

    fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn words(text: &str) -> Vec<Word> {
        text.split_whitespace().map(Word::new).collect()
    }

    #[test]
    fn initial_letter_rule() {
        let f = AAnFilter::new();
        assert!(f.filter_out(&words("a apple")));
        assert!(f.filter_out(&words("she ate an pear")));
        assert!(!f.filter_out(&words("an apple")));
        assert!(!f.filter_out(&words("a pear and an Orange")));
        assert!(!f.filter_out(&words("a")));
        assert!(!f.filter_out(&[]));
    }

    #[test]
    fn exceptions_flip_the_rule() {
        let mut f = AAnFilter::new();
        assert!(f.add_exception("an", "hour"));
        assert!(f.add_exception("a", "university"));
        assert!(!f.add_exception("the", "hour"));
        assert_eq!(f.exception_count(), 2);

        assert!(!f.filter_out(&words("an hour")));
        assert!(f.filter_out(&words("a hour")));
        assert!(!f.filter_out(&words("a university")));
        assert!(f.filter_out(&words("an university")));
    }

    #[test]
    fn reverse_reads_pairs_backwards() {
        let mut f = AAnFilter::new();
        f.set_reverse(true);
        // "apple a" reversed is "a apple"
        assert!(f.filter_out(&words("apple a")));
        assert!(!f.filter_out(&words("apple an")));
        assert!(!f.filter_out(&words("a apple")));
    }

    #[test]
    fn load_and_cull() {
        let bigrams = "a hour\nan hour\na cat\nan egg\nthe end\nan\na university\n";
        let mut culled = Vec::new();
        let n = AAnFilter::cull_exceptions(Cursor::new(bigrams), &mut culled).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            String::from_utf8(culled.clone()).unwrap(),
            "an hour\na university\n"
        );

        let mut f = AAnFilter::new();
        f.load_exceptions(Cursor::new(culled)).unwrap();
        assert!(!f.filter_out(&words("an hour")));
    }

    #[test]
    fn exceptions_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aan.txt");
        std::fs::write(&path, "an honest\n\na one\n").unwrap();
        let f = AAnFilter::from_exceptions_file(&path).unwrap();
        assert_eq!(f.exception_count(), 2);
        assert!(!f.filter_out(&words("a one")));

        let err = AAnFilter::from_exceptions_file(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
