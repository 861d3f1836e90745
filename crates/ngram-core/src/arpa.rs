//! ARPA backoff model reader.
//!
//! ```text
//! \data\
//! ngram 1=3
//! ngram 2=2
//!
//! \1-grams:
//! -1.0  <s>  -0.3
//! -0.5  dog  -0.2
//! -0.4  </s>
//!
//! \2-grams:
//! -0.2  <s> dog
//! -0.1  dog </s>
//!
//! \end\
//! ```
//!
//! N-grams of one order are grouped by their shared prefix and handed to
//! the trie in one batch per prefix.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, debug_span, warn};

use crate::backoff::{BackoffModel, ModelOptions};
use crate::error::LoadError;
use crate::model::LanguageModel;
use crate::symbol::Symbol;
use crate::trie::{BackoffTrie, NgramEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Before `\data\`; anything here is ignored.
    Preamble,
    /// `ngram N=count` lines.
    Header,
    /// Inside `\N-grams:`.
    Section(usize),
    Done,
}

/// Sibling n-grams waiting to be attached under one prefix.
struct PendingGroup {
    prefix: Vec<Symbol>,
    batch: Vec<(Symbol, NgramEntry)>,
    line: usize,
}

impl PendingGroup {
    fn new() -> Self {
        Self {
            prefix: Vec::new(),
            batch: Vec::new(),
            line: 0,
        }
    }

    fn flush(&mut self, trie: &mut BackoffTrie, path: &Path) -> Result<(), LoadError> {
        if !self.batch.is_empty() {
            trie.add_children(&self.prefix, &self.batch)
                .map_err(|source| LoadError::Trie {
                    path: path.to_path_buf(),
                    line: self.line,
                    source,
                })?;
        }
        self.prefix.clear();
        self.batch.clear();
        Ok(())
    }
}

struct ArpaReader<'a> {
    path: &'a Path,
    order: usize,
    trie: BackoffTrie,
    phase: Phase,
    declared: Vec<usize>,
    actual: Vec<usize>,
    pending: PendingGroup,
    tokens: Vec<Symbol>,
}

impl<'a> ArpaReader<'a> {
    fn new(path: &'a Path, order: usize) -> Self {
        Self {
            path,
            order,
            trie: BackoffTrie::new(order),
            phase: Phase::Preamble,
            declared: Vec::new(),
            actual: vec![0; order],
            pending: PendingGroup::new(),
            tokens: Vec::with_capacity(order),
        }
    }

    fn parse_error(&self, line: usize, reason: impl Into<String>) -> LoadError {
        LoadError::Parse {
            path: self.path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }

    fn check_order(&self, line: usize, found: usize) -> Result<(), LoadError> {
        if found > self.order {
            return Err(LoadError::OrderExceeded {
                path: self.path.to_path_buf(),
                line,
                found,
                max: self.order,
            });
        }
        Ok(())
    }

    fn read_line(&mut self, line_no: usize, raw: &str) -> Result<(), LoadError> {
        let line = raw.trim();
        match self.phase {
            Phase::Preamble => {
                if line == "\\data\\" {
                    self.phase = Phase::Header;
                }
                Ok(())
            }
            Phase::Header => {
                if line.is_empty() || line.starts_with('#') {
                    Ok(())
                } else if line.starts_with('\\') {
                    if self.declared.is_empty() {
                        return Err(self.parse_error(line_no, "no n-gram counts in header"));
                    }
                    self.start_section(line_no, line)
                } else {
                    self.read_count(line_no, line)
                }
            }
            Phase::Section(n) => {
                if line.is_empty() {
                    Ok(())
                } else if line.starts_with('\\') {
                    self.pending.flush(&mut self.trie, self.path)?;
                    if line == "\\end\\" {
                        self.phase = Phase::Done;
                        Ok(())
                    } else {
                        self.start_section(line_no, line)
                    }
                } else {
                    self.read_ngram(line_no, line, n)
                }
            }
            Phase::Done => Ok(()),
        }
    }

    /// `ngram N=count`
    fn read_count(&mut self, line_no: usize, line: &str) -> Result<(), LoadError> {
        let spec = line
            .strip_prefix("ngram")
            .map(str::trim)
            .ok_or_else(|| self.parse_error(line_no, format!("expected 'ngram N=count', got '{line}'")))?;
        let (n, count) = spec
            .split_once('=')
            .ok_or_else(|| self.parse_error(line_no, format!("missing '=' in '{line}'")))?;
        let n: usize = n
            .trim()
            .parse()
            .map_err(|e| self.parse_error(line_no, format!("invalid n-gram order '{}': {e}", n.trim())))?;
        let count: usize = count
            .trim()
            .parse()
            .map_err(|e| self.parse_error(line_no, format!("invalid n-gram count '{}': {e}", count.trim())))?;
        if n == 0 {
            return Err(self.parse_error(line_no, "n-gram order must be at least 1"));
        }
        self.check_order(line_no, n)?;
        if n != self.declared.len() + 1 {
            return Err(self.parse_error(
                line_no,
                format!("expected count for order {}, got order {n}", self.declared.len() + 1),
            ));
        }
        self.declared.push(count);
        Ok(())
    }

    /// `\N-grams:`
    fn start_section(&mut self, line_no: usize, line: &str) -> Result<(), LoadError> {
        let n: usize = line
            .strip_prefix('\\')
            .and_then(|rest| rest.strip_suffix("-grams:"))
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| self.parse_error(line_no, format!("invalid section header '{line}'")))?;
        self.check_order(line_no, n)?;
        let expected = match self.phase {
            Phase::Section(prev) => prev + 1,
            _ => 1,
        };
        if n != expected {
            return Err(self.parse_error(
                line_no,
                format!("section {n}-grams out of sequence, expected {expected}-grams"),
            ));
        }
        if n > self.declared.len() {
            return Err(self.parse_error(line_no, format!("section {n}-grams not declared in header")));
        }
        self.phase = Phase::Section(n);
        Ok(())
    }

    /// `logprob tok_1 ... tok_n [backoff]`
    fn read_ngram(&mut self, line_no: usize, line: &str, n: usize) -> Result<(), LoadError> {
        let mut fields = line.split_whitespace();
        let log_prob = parse_weight(fields.next(), "log probability")
            .map_err(|reason| self.parse_error(line_no, reason))?;

        self.tokens.clear();
        for field in fields.by_ref().take(n) {
            self.tokens.push(Symbol::intern(field));
        }
        if self.tokens.len() < n {
            return Err(self.parse_error(
                line_no,
                format!("expected {n} tokens, got {}", self.tokens.len()),
            ));
        }
        let backoff = match fields.next() {
            Some(field) => parse_weight(Some(field), "backoff weight")
                .map_err(|reason| self.parse_error(line_no, reason))?,
            None => 0.0,
        };
        if let Some(extra) = fields.next() {
            return Err(self.parse_error(line_no, format!("unexpected trailing field '{extra}'")));
        }

        let (last, prefix) = match self.tokens.split_last() {
            Some(split) => split,
            None => return Err(self.parse_error(line_no, "empty n-gram")),
        };
        if self.pending.prefix.as_slice() != prefix {
            self.pending.flush(&mut self.trie, self.path)?;
            self.pending.prefix.extend_from_slice(prefix);
        }
        if self.pending.batch.is_empty() {
            self.pending.line = line_no;
        }
        self.pending.batch.push((*last, NgramEntry::new(log_prob, backoff)));
        self.actual[n - 1] += 1;
        Ok(())
    }

    fn finish(self, options: ModelOptions) -> Result<BackoffModel, LoadError> {
        match self.phase {
            Phase::Done => {}
            Phase::Preamble => {
                return Err(LoadError::UnexpectedEof {
                    path: self.path.to_path_buf(),
                    expected: "\\data\\".to_string(),
                })
            }
            Phase::Header | Phase::Section(_) => {
                return Err(LoadError::UnexpectedEof {
                    path: self.path.to_path_buf(),
                    expected: "\\end\\".to_string(),
                })
            }
        }
        for (i, (&declared, &actual)) in self.declared.iter().zip(&self.actual).enumerate() {
            if declared != actual {
                warn!(
                    path = %self.path.display(),
                    order = i + 1,
                    declared,
                    actual,
                    "n-gram count differs from header"
                );
            }
        }
        let model = BackoffModel::new(self.trie, self.order, options)?;
        debug!(
            path = %self.path.display(),
            order = self.order,
            entries = model.trie().entry_count(),
            open_vocabulary = model.is_open_vocabulary(),
            "loaded ARPA model"
        );
        Ok(model)
    }
}

fn parse_weight(field: Option<&str>, what: &str) -> Result<f32, String> {
    let field = field.ok_or_else(|| format!("missing {what}"))?;
    field
        .parse::<f32>()
        .map_err(|e| format!("invalid {what} '{field}': {e}"))
}

impl BackoffModel {
    /// Read an ARPA model of at most `order` from `reader`. `source` names
    /// the input in errors and logs.
    pub fn from_arpa<R: BufRead>(
        reader: R,
        source: impl AsRef<Path>,
        order: usize,
        options: ModelOptions,
    ) -> Result<Self, LoadError> {
        if order == 0 {
            return Err(LoadError::ZeroOrder);
        }
        let path = source.as_ref();
        let _span = debug_span!("from_arpa", path = %path.display(), order).entered();
        let mut arpa = ArpaReader::new(path, order);
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            arpa.read_line(idx + 1, &line)?;
            if arpa.phase == Phase::Done {
                break;
            }
        }
        arpa.finish(options)
    }

    /// Read an ARPA model of at most `order` from a file.
    pub fn from_arpa_file(
        path: impl AsRef<Path>,
        order: usize,
        options: ModelOptions,
    ) -> Result<Self, LoadError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_arpa(BufReader::new(file), &path, order, options)
    }
}
