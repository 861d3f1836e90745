//! Factored n-gram models: several parallel token streams (form, POS, pitch
//! accent, ...) each predicted from chosen parent factors, with the
//! per-stream log probs summed.
//!
//! A family is read from a spec file:
//!
//! ```text
//! # number of models
//! 2
//! W : 2 W(-1) W(-2) w.count w.lm 3
//! W1,W2 W2 kn
//! P : 1 P(-1) p.count p.lm 2
//! ```
//!
//! Consecutive models predicting the same child form a group. The first
//! model of a group is the primary; the others are consulted near the start
//! of a sequence, when less history is available than the primary needs.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, debug_span, trace};

use crate::backoff::{backoff_log_prob, BackoffModel, ModelOptions};
use crate::error::LoadError;
use crate::model::{sem_class_replacement, LanguageModel, Scratch};
use crate::settings::settings;
use crate::symbol::Symbol;
use crate::trie::BackoffTrie;
use crate::word::{Word, WORD_ATTR};

/// A factor at a relative position: `W(-1)` is the previous word's form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorRef {
    pub name: String,
    /// How many positions before the predicted word.
    pub offset: usize,
}

impl FromStr for FactorRef {
    type Err = String;

    /// Accepts `F(-k)`, `F(k)` and `Fk`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, offset) = match s.strip_suffix(')').and_then(|rest| rest.split_once('(')) {
            Some((name, inner)) => (name, inner.trim_start_matches('-')),
            None => {
                let digits = s.trim_end_matches(|c: char| c.is_ascii_digit());
                (digits, &s[digits.len()..])
            }
        };
        if name.is_empty() {
            return Err(format!("missing factor name in '{s}'"));
        }
        let offset = offset
            .parse()
            .map_err(|_| format!("invalid position offset in '{s}'"))?;
        Ok(Self {
            name: name.to_string(),
            offset,
        })
    }
}

/// Lookup token of factor `name` for `word`: the raw form for `W`, `name-value`
/// otherwise, with `<NULL>` for a missing value. Boundary markers stay as they
/// are for every factor.
pub fn factor_key(word: &Word, name: &str, options: &ModelOptions) -> Symbol {
    if word.is_boundary() {
        return word.form();
    }
    if name == WORD_ATTR {
        return sem_class_replacement(word, options.use_sem_classes, &*options.tokenizer)
            .unwrap_or_else(|| word.form());
    }
    let val = word.val(name).unwrap_or(Symbol::NULL);
    Symbol::intern(&format!("{name}-{val}"))
}

/// One conditional model `child | parents`.
#[derive(Debug)]
pub struct FactoredModel {
    child: String,
    /// Most important first.
    parents: Vec<FactorRef>,
    order: usize,
    lm: BackoffModel,
    child_slot: usize,
    parent_slots: Vec<usize>,
}

impl FactoredModel {
    /// `lm` must accept n-grams of `parents.len() + 1` tokens.
    pub fn new(child: &str, parents: Vec<FactorRef>, lm: BackoffModel) -> Self {
        let order = 1 + parents.iter().map(|p| p.offset).max().unwrap_or(0);
        Self {
            child: child.to_string(),
            parent_slots: vec![0; parents.len()],
            parents,
            order,
            lm,
            child_slot: 0,
        }
    }

    pub fn child(&self) -> &str {
        &self.child
    }

    pub fn parents(&self) -> &[FactorRef] {
        &self.parents
    }

    /// Positions of history plus one.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn lm(&self) -> &BackoffModel {
        &self.lm
    }

    /// Point the model at rows of the family's factor table.
    fn bind(&mut self, factors: &mut Vec<String>) {
        self.child_slot = slot_of(factors, &self.child);
        for (slot, parent) in self.parent_slots.iter_mut().zip(&self.parents) {
            *slot = slot_of(factors, &parent.name);
        }
    }

    /// Keys for predicting position `target` with `history` positions before
    /// it: the parents that fit in the history, least important first, then
    /// the child.
    fn fill_keys(&self, rows: &[Vec<Symbol>], lookup: &mut Vec<Symbol>, target: usize, history: usize) {
        lookup.clear();
        let usable = self
            .parents
            .iter()
            .take_while(|p| p.offset <= history)
            .count();
        for (parent, &slot) in self.parents[..usable]
            .iter()
            .zip(&self.parent_slots[..usable])
            .rev()
        {
            lookup.push(rows[slot][target - parent.offset]);
        }
        lookup.push(rows[self.child_slot][target]);

        if self.lm.is_open_vocabulary() {
            let trie = self.lm.trie();
            for key in lookup.iter_mut() {
                if !trie.has_child(BackoffTrie::ROOT, *key) {
                    *key = Symbol::UNKNOWN;
                }
            }
        }
    }

    fn log_prob(&self, scratch: &mut Scratch, start: usize, order: usize) -> f32 {
        if start == 0 && order == 1 && scratch.rows[self.child_slot].first() == Some(&Symbol::START) {
            return 0.0;
        }
        self.fill_keys(&scratch.rows, &mut scratch.lookup, start + order - 1, order - 1);
        backoff_log_prob(self.lm.trie(), &scratch.lookup)
    }
}

fn slot_of(factors: &mut Vec<String>, name: &str) -> usize {
    match factors.iter().position(|f| f == name) {
        Some(slot) => slot,
        None => {
            factors.push(name.to_string());
            factors.len() - 1
        }
    }
}

/// A primary model and the shorter-history models predicting the same child.
#[derive(Debug)]
pub struct ModelGroup {
    primary: FactoredModel,
    secondary: Vec<FactoredModel>,
}

impl ModelGroup {
    pub fn child_name(&self) -> &str {
        self.primary.child()
    }

    pub fn primary(&self) -> &FactoredModel {
        &self.primary
    }

    pub fn secondary(&self) -> &[FactoredModel] {
        &self.secondary
    }

    /// The model to consult for an n-gram of `order` positions.
    pub fn model_for(&self, order: usize) -> &FactoredModel {
        if order >= self.primary.order {
            return &self.primary;
        }
        match self.secondary.iter().position(|m| m.order == order) {
            Some(i) => {
                trace!(child = %self.primary.child, secondary = i, order, "secondary model");
                &self.secondary[i]
            }
            None => &self.primary,
        }
    }

    fn log_prob(&self, scratch: &mut Scratch, start: usize, order: usize) -> f32 {
        self.model_for(order).log_prob(scratch, start, order)
    }

    fn models_mut(&mut self) -> impl Iterator<Item = &mut FactoredModel> {
        std::iter::once(&mut self.primary).chain(self.secondary.iter_mut())
    }
}

/// Model groups whose log probs are summed per position.
#[derive(Debug)]
pub struct FactoredModelFamily {
    /// The first group is the primary one.
    groups: Vec<ModelGroup>,
    factors: Vec<String>,
    options: ModelOptions,
}

impl FactoredModelFamily {
    /// Group consecutive models by child name. `None` if `models` is empty.
    pub fn from_models(models: Vec<FactoredModel>, options: ModelOptions) -> Option<Self> {
        let mut groups: Vec<ModelGroup> = Vec::new();
        for model in models {
            match groups.last_mut() {
                Some(group) if group.child_name() == model.child() => group.secondary.push(model),
                _ => groups.push(ModelGroup {
                    primary: model,
                    secondary: Vec::new(),
                }),
            }
        }
        if groups.is_empty() {
            return None;
        }
        let mut factors = Vec::new();
        for group in &mut groups {
            for model in group.models_mut() {
                model.bind(&mut factors);
            }
        }
        Some(Self {
            groups,
            factors,
            options,
        })
    }

    /// Read a family spec. LM paths are resolved against the spec's directory.
    pub fn from_spec_file(path: impl AsRef<Path>, options: ModelOptions) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let _span = debug_span!("from_spec_file", path = %path.display()).entered();
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let max_tokens = settings().factored.max_tokens_per_line;

        let parse_error = |line: usize, reason: String| LoadError::Parse {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut expected: Option<usize> = None;
        let mut models = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let tokens: Vec<&str> = line.split_whitespace().take(max_tokens).collect();
            let Some(first) = tokens.first() else {
                continue;
            };
            if first.starts_with('#') {
                continue;
            }
            let Some(count) = expected else {
                let count = first
                    .parse()
                    .map_err(|e| parse_error(line_no, format!("invalid model count '{first}': {e}")))?;
                expected = Some(count);
                continue;
            };
            if models.len() >= count {
                break;
            }
            // backoff graph node lines follow each model line
            if tokens.get(1) != Some(&":") {
                continue;
            }

            let num_parents: usize = tokens
                .get(2)
                .ok_or_else(|| parse_error(line_no, "missing parent count".to_string()))?
                .parse()
                .map_err(|e| parse_error(line_no, format!("invalid parent count: {e}")))?;
            let parents = (0..num_parents)
                .map(|i| {
                    let spec = tokens
                        .get(3 + i)
                        .ok_or_else(|| parse_error(line_no, format!("missing parent {}", i + 1)))?;
                    spec.parse::<FactorRef>()
                        .map_err(|reason| parse_error(line_no, reason))
                })
                .collect::<Result<Vec<_>, _>>()?;
            // the count file name is not needed
            let lm_name = tokens
                .get(num_parents + 4)
                .ok_or_else(|| parse_error(line_no, "missing LM file name".to_string()))?;
            let lm_path: PathBuf = dir.join(lm_name);
            let lm = BackoffModel::from_arpa_file(&lm_path, num_parents + 1, options.clone())?;
            debug!(child = tokens[0], parents = num_parents, lm = %lm_path.display(), "loaded factored model");
            models.push(FactoredModel::new(tokens[0], parents, lm));
        }

        let Some(expected) = expected else {
            return Err(LoadError::NoModels {
                path: path.to_path_buf(),
            });
        };
        if models.len() != expected {
            return Err(LoadError::ModelCount {
                path: path.to_path_buf(),
                expected,
                found: models.len(),
            });
        }
        Self::from_models(models, options).ok_or_else(|| LoadError::NoModels {
            path: path.to_path_buf(),
        })
    }

    pub fn groups(&self) -> &[ModelGroup] {
        &self.groups
    }

    pub fn primary_group(&self) -> &ModelGroup {
        &self.groups[0]
    }

    pub fn further_groups(&self) -> &[ModelGroup] {
        &self.groups[1..]
    }

    /// Factor names in row order.
    pub fn factors(&self) -> &[String] {
        &self.factors
    }
}

impl LanguageModel for FactoredModelFamily {
    fn order(&self) -> usize {
        self.primary_group().primary().order()
    }

    fn is_open_vocabulary(&self) -> bool {
        self.primary_group().primary().lm().is_open_vocabulary()
    }

    fn prepare(&self, words: &[Word], scratch: &mut Scratch) {
        scratch.rows.resize_with(self.factors.len(), Vec::new);
        for (row, name) in scratch.rows.iter_mut().zip(&self.factors) {
            row.clear();
            row.extend(words.iter().map(|w| factor_key(w, name, &self.options)));
        }
    }

    fn log_prob_from_ngram(
        &self,
        _words: &[Word],
        scratch: &mut Scratch,
        start: usize,
        order: usize,
    ) -> f32 {
        let mut total = 0.0f32;
        for group in &self.groups {
            total += group.log_prob(scratch, start, order);
        }
        trace!(position = start + order - 1, order, log_prob = total, "factored ngram");
        total
    }

    fn for_each_ngram(
        &self,
        _words: &[Word],
        scratch: &mut Scratch,
        start: usize,
        order: usize,
        visit: &mut dyn FnMut(&[Symbol]),
    ) {
        for group in &self.groups {
            if group.log_prob(scratch, start, order) != 0.0 {
                visit(&scratch.lookup);
            }
        }
    }
}
