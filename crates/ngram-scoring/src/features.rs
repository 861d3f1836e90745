//! Feature alphabets and sparse feature maps for discriminative rerankers.
//!
//! Scorers only ever ask an `Alphabet` for indices and push counts or
//! values into a `FeatureMap`; training and weight storage live elsewhere.

use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use ngram_core::{LoadError, Phrase, Symbol};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::scorer::Scorer;

/// Dense index of a feature in an alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(pub u32);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps n-gram keys and named scalars to feature indices.
///
/// `None` means the feature is not part of the alphabet and should be
/// dropped by the caller.
pub trait Alphabet: Send + Sync {
    fn index(&self, keys: &[Symbol]) -> Option<FeatureId>;

    fn index_name(&self, name: &str) -> Option<FeatureId>;
}

/// Feature name for a key sequence: the keys joined by `:`.
pub fn feature_name(keys: &[Symbol]) -> String {
    let mut name = String::new();
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            name.push(':');
        }
        name.push_str(key.as_str());
    }
    name
}

#[derive(Debug, Default)]
struct AlphabetInner {
    ids: FxHashMap<String, FeatureId>,
    names: Vec<String>,
    closed: bool,
}

/// An alphabet that grows on lookup until it is closed; afterwards unknown
/// features map to `None`.
#[derive(Debug, Default)]
pub struct FeatureAlphabet {
    inner: RwLock<AlphabetInner>,
}

impl FeatureAlphabet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A closed alphabet holding exactly `names`, in order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let alphabet = Self::new();
        for name in names {
            alphabet.add(name.into());
        }
        alphabet.set_closed(true);
        alphabet
    }

    /// Read a closed alphabet: a feature count, then one `name value` line
    /// per feature (the value, a frequency or weight, is ignored).
    pub fn from_reader<R: BufRead>(reader: R, source: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = source.as_ref();
        let parse_error = |line: usize, reason: String| LoadError::Parse {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let alphabet = Self::new();
        let mut expected: Option<usize> = None;
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let Some(first) = line.split_whitespace().next() else {
                continue;
            };
            match expected {
                None => {
                    let count = first
                        .parse()
                        .map_err(|e| parse_error(idx + 1, format!("invalid feature count '{first}': {e}")))?;
                    expected = Some(count);
                }
                Some(count) if alphabet.len() < count => {
                    alphabet.add(first.to_owned());
                }
                Some(_) => break,
            }
        }
        let expected = expected.unwrap_or(0);
        if alphabet.len() != expected {
            return Err(LoadError::UnexpectedEof {
                path: path.to_path_buf(),
                expected: format!("{expected} features, found {}", alphabet.len()),
            });
        }
        alphabet.set_closed(true);
        Ok(alphabet)
    }

    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    pub fn set_closed(&self, closed: bool) {
        self.inner.write().closed = closed;
    }

    /// Name of a feature handed out by this alphabet.
    pub fn name(&self, id: FeatureId) -> Option<String> {
        self.inner.read().names.get(id.0 as usize).cloned()
    }

    fn add(&self, name: String) -> FeatureId {
        let mut inner = self.inner.write();
        if let Some(&id) = inner.ids.get(&name) {
            return id;
        }
        let id = FeatureId(inner.names.len() as u32);
        inner.names.push(name.clone());
        inner.ids.insert(name, id);
        id
    }

    fn lookup(&self, name: String) -> Option<FeatureId> {
        {
            let inner = self.inner.read();
            if let Some(&id) = inner.ids.get(&name) {
                return Some(id);
            }
            if inner.closed {
                return None;
            }
        }
        Some(self.add(name))
    }
}

impl Alphabet for FeatureAlphabet {
    fn index(&self, keys: &[Symbol]) -> Option<FeatureId> {
        self.lookup(feature_name(keys))
    }

    fn index_name(&self, name: &str) -> Option<FeatureId> {
        self.lookup(name.to_owned())
    }
}

/// Sparse feature values in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMap {
    entries: Vec<(FeatureId, f32)>,
    slots: FxHashMap<FeatureId, usize>,
}

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to a count feature.
    pub fn inc(&mut self, feature: FeatureId) {
        self.add(feature, 1.0);
    }

    pub fn add(&mut self, feature: FeatureId, value: f32) {
        match self.slots.get(&feature) {
            Some(&slot) => self.entries[slot].1 += value,
            None => {
                self.slots.insert(feature, self.entries.len());
                self.entries.push((feature, value));
            }
        }
    }

    /// Value of `feature`, 0 if absent.
    pub fn get(&self, feature: FeatureId) -> f32 {
        self.slots
            .get(&feature)
            .map_or(0.0, |&slot| self.entries[slot].1)
    }

    /// Add every value of `other` into this map.
    pub fn merge(&mut self, other: &FeatureMap) {
        for &(feature, value) in &other.entries {
            self.add(feature, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, f32)> + '_ {
        self.entries.iter().copied()
    }

    /// Dot product with a dense weight vector; features past its end count 0.
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.entries
            .iter()
            .map(|&(f, v)| weights.get(f.0 as usize).map_or(0.0, |w| w * v as f64))
            .sum()
    }
}

/// Something that can describe a phrase as a feature map.
pub trait FeatureExtractor: Send + Sync {
    fn extract_features(&self, phrase: &Phrase, complete: bool) -> FeatureMap;

    fn set_alphabet(&mut self, alphabet: Arc<dyn Alphabet>);
}

/// Sums the feature maps of several extractors.
pub struct ComposedFeatureExtractor<'a> {
    extractors: Vec<&'a dyn FeatureExtractor>,
}

impl<'a> ComposedFeatureExtractor<'a> {
    pub fn new(extractors: Vec<&'a dyn FeatureExtractor>) -> Self {
        Self { extractors }
    }

    /// The scorers that extract features; the rest are skipped.
    pub fn from_scorers(scorers: &'a [Box<dyn Scorer>]) -> Self {
        Self::new(
            scorers
                .iter()
                .filter_map(|s| s.as_feature_extractor())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    pub fn extract_features(&self, phrase: &Phrase, complete: bool) -> FeatureMap {
        let mut map = FeatureMap::new();
        for extractor in &self.extractors {
            map.merge(&extractor.extract_features(phrase, complete));
        }
        map
    }
}
