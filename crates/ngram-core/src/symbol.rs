//! Process-wide token interning.
//!
//! Every token that reaches a trie or a scratch buffer is a `Symbol`: a dense
//! `u32` id handed out by a global append-only table. Equality and hashing
//! are on the id, so lookups never compare string contents.

use std::fmt;
use std::sync::OnceLock;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Names pre-interned at fixed ids, in id order.
const RESERVED: [&str; 4] = ["<s>", "</s>", "<unk>", "<NULL>"];

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

#[derive(Default)]
struct Interner {
    ids: FxHashMap<&'static str, Symbol>,
    names: Vec<&'static str>,
}

impl Interner {
    fn insert(&mut self, text: &str) -> Symbol {
        if let Some(&sym) = self.ids.get(text) {
            return sym;
        }
        // Interned names live for the rest of the process.
        let name: &'static str = Box::leak(text.to_owned().into_boxed_str());
        let sym = Symbol(self.names.len() as u32);
        self.names.push(name);
        self.ids.insert(name, sym);
        sym
    }
}

fn interner() -> &'static RwLock<Interner> {
    static INSTANCE: OnceLock<RwLock<Interner>> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let mut table = Interner::default();
        for name in RESERVED {
            table.insert(name);
        }
        RwLock::new(table)
    })
}

impl Symbol {
    /// Sentence start marker `<s>`.
    pub const START: Symbol = Symbol(0);
    /// Sentence end marker `</s>`.
    pub const END: Symbol = Symbol(1);
    /// Unknown-word token `<unk>`.
    pub const UNKNOWN: Symbol = Symbol(2);
    /// Placeholder for a missing factor value.
    pub const NULL: Symbol = Symbol(3);

    /// Intern `text`, returning the existing id if it has been seen before.
    pub fn intern(text: &str) -> Symbol {
        if let Some(&sym) = interner().read().ids.get(text) {
            return sym;
        }
        interner().write().insert(text)
    }

    /// Look up `text` without interning it.
    pub fn get(text: &str) -> Option<Symbol> {
        interner().read().ids.get(text).copied()
    }

    pub fn as_str(self) -> &'static str {
        interner().read().names[self.0 as usize]
    }

    pub fn id(self) -> u32 {
        self.0
    }

    /// True for `<s>` and `</s>`.
    pub fn is_boundary(self) -> bool {
        self == Symbol::START || self == Symbol::END
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({}, {:?})", self.0, self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(text: &str) -> Self {
        Symbol::intern(text)
    }
}
