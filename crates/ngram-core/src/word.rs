//! Words and phrases as seen by the scorers.
//!
//! A `Word` is produced by the surrounding generator and only read here. All
//! of its fields are interned, so cloning one into a scratch buffer is cheap.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::settings::settings;
use crate::symbol::Symbol;

/// Factor name for the surface form.
pub const WORD_ATTR: &str = "W";
/// Factor name for the stem.
pub const STEM_ATTR: &str = "S";
/// Factor name for the part of speech.
pub const POS_ATTR: &str = "P";
/// Factor name for the supertag.
pub const SUPERTAG_ATTR: &str = "T";
/// Factor name for the semantic class.
pub const SEM_CLASS_ATTR: &str = "C";
/// Factor name for the pitch accent.
pub const PITCH_ACCENT_ATTR: &str = "A";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Word {
    form: Symbol,
    stem: Option<Symbol>,
    pos: Option<Symbol>,
    supertag: Option<Symbol>,
    sem_class: Option<Symbol>,
    pitch_accent: Option<Symbol>,
    /// Extra attribute/value pairs, in the order they were given.
    attrs: Arc<[(Symbol, Symbol)]>,
}

impl Word {
    /// A word carrying only a surface form.
    pub fn new(form: &str) -> Self {
        Self::from_symbol(Symbol::intern(form))
    }

    pub fn from_symbol(form: Symbol) -> Self {
        Self {
            form,
            stem: None,
            pos: None,
            supertag: None,
            sem_class: None,
            pitch_accent: None,
            attrs: Arc::from(Vec::new()),
        }
    }

    /// The sentence start marker.
    pub fn start() -> Self {
        Self::from_symbol(Symbol::START)
    }

    /// The sentence end marker.
    pub fn end() -> Self {
        Self::from_symbol(Symbol::END)
    }

    /// Build a word from attribute/value pairs, routing the standard factor
    /// names (`W`, `S`, `P`, `T`, `C`, `A`) to their fields. A word without a
    /// `W` pair gets the `<NULL>` form.
    pub fn from_attrs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut word = Self::from_symbol(Symbol::NULL);
        let mut extra = Vec::new();
        for (attr, val) in pairs {
            let val = Symbol::intern(val);
            match attr {
                WORD_ATTR => word.form = val,
                STEM_ATTR => word.stem = Some(val),
                POS_ATTR => word.pos = Some(val),
                SUPERTAG_ATTR => word.supertag = Some(val),
                SEM_CLASS_ATTR => word.sem_class = Some(val),
                PITCH_ACCENT_ATTR => word.pitch_accent = Some(val),
                _ => extra.push((Symbol::intern(attr), val)),
            }
        }
        word.attrs = Arc::from(extra);
        word
    }

    pub fn with_stem(mut self, stem: &str) -> Self {
        self.stem = Some(Symbol::intern(stem));
        self
    }

    pub fn with_pos(mut self, pos: &str) -> Self {
        self.pos = Some(Symbol::intern(pos));
        self
    }

    pub fn with_supertag(mut self, supertag: &str) -> Self {
        self.supertag = Some(Symbol::intern(supertag));
        self
    }

    pub fn with_sem_class(mut self, sem_class: &str) -> Self {
        self.sem_class = Some(Symbol::intern(sem_class));
        self
    }

    pub fn with_pitch_accent(mut self, accent: &str) -> Self {
        self.pitch_accent = Some(Symbol::intern(accent));
        self
    }

    pub fn with_attr(mut self, attr: &str, val: &str) -> Self {
        let mut attrs = self.attrs.to_vec();
        attrs.push((Symbol::intern(attr), Symbol::intern(val)));
        self.attrs = Arc::from(attrs);
        self
    }

    pub fn form(&self) -> Symbol {
        self.form
    }

    pub fn stem(&self) -> Option<Symbol> {
        self.stem
    }

    pub fn pos(&self) -> Option<Symbol> {
        self.pos
    }

    pub fn supertag(&self) -> Option<Symbol> {
        self.supertag
    }

    pub fn sem_class(&self) -> Option<Symbol> {
        self.sem_class
    }

    pub fn pitch_accent(&self) -> Option<Symbol> {
        self.pitch_accent
    }

    pub fn attrs(&self) -> &[(Symbol, Symbol)] {
        &self.attrs
    }

    pub fn is_boundary(&self) -> bool {
        self.form.is_boundary()
    }

    /// Value of the named factor, or `None` if the word does not carry it.
    pub fn val(&self, attr: &str) -> Option<Symbol> {
        match attr {
            WORD_ATTR => Some(self.form),
            STEM_ATTR => self.stem,
            POS_ATTR => self.pos,
            SUPERTAG_ATTR => self.supertag,
            SEM_CLASS_ATTR => self.sem_class,
            PITCH_ACCENT_ATTR => self.pitch_accent,
            _ => {
                let attr = Symbol::get(attr)?;
                self.attrs
                    .iter()
                    .find_map(|&(a, v)| (a == attr).then_some(v))
            }
        }
    }
}

/// An immutable word sequence, optionally remembering the phrases it was
/// built from.
///
/// The first input (last when scoring in reverse) is the prefix whose cached
/// log probability a scorer may reuse.
#[derive(Debug, Clone)]
pub struct Phrase {
    words: Arc<[Word]>,
    inputs: Vec<Arc<[Word]>>,
}

impl Phrase {
    pub fn new(words: impl Into<Arc<[Word]>>) -> Self {
        Self {
            words: words.into(),
            inputs: Vec::new(),
        }
    }

    /// Whitespace-separated surface forms, for tests and tools.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.split_whitespace().map(Word::new).collect::<Vec<_>>())
    }

    /// Concatenate `parts` in order, recording each one as a derivation input.
    pub fn combine(parts: &[&Phrase]) -> Self {
        let words: Vec<Word> = parts.iter().flat_map(|p| p.words.iter().cloned()).collect();
        Self {
            words: Arc::from(words),
            inputs: parts.iter().map(|p| Arc::clone(&p.words)).collect(),
        }
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn inputs(&self) -> &[Arc<[Word]>] {
        &self.inputs
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Decides which semantic classes replace word forms in language models.
pub trait Tokenizer: Send + Sync {
    fn is_replacement_sem_class(&self, sem_class: Symbol) -> bool;
}

pub struct DefaultTokenizer {
    replacement_sem_classes: FxHashSet<Symbol>,
}

impl Default for DefaultTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultTokenizer {
    /// Tokenizer seeded with `tokenizer.replacement_sem_classes` from settings.
    pub fn new() -> Self {
        Self {
            replacement_sem_classes: settings()
                .tokenizer
                .replacement_sem_classes
                .iter()
                .map(|c| Symbol::intern(c))
                .collect(),
        }
    }

    /// Tokenizer with no replacement classes.
    pub fn empty() -> Self {
        Self {
            replacement_sem_classes: FxHashSet::default(),
        }
    }

    pub fn add_replacement_sem_class(&mut self, sem_class: &str) {
        self.replacement_sem_classes.insert(Symbol::intern(sem_class));
    }
}

impl Tokenizer for DefaultTokenizer {
    fn is_replacement_sem_class(&self, sem_class: Symbol) -> bool {
        self.replacement_sem_classes.contains(&sem_class)
    }
}
