//! Backoff n-gram language models over interned tokens.
//!
//! Models are loaded once (ARPA files, factored model families) and then
//! shared immutably; per-call state lives in a caller-owned `Scratch`.

mod arpa;
pub mod backoff;
pub mod error;
pub mod factored;
pub mod filter;
pub mod interpolation;
pub mod model;
pub mod numeric;
pub mod settings;
pub mod symbol;
pub mod trace_init;
pub mod trie;
pub mod word;

pub use backoff::{backoff_log_prob, BackoffModel, ModelOptions};
pub use error::{LoadError, TrieError, WeightsError};
pub use factored::{FactorRef, FactoredModel, FactoredModelFamily, ModelGroup};
pub use filter::{AAnFilter, NgramFilter};
pub use interpolation::LinearInterpolation;
pub use model::{sequence_log_prob, LanguageModel, Scratch};
pub use numeric::LOG_ZERO;
pub use symbol::Symbol;
pub use trace_init::init_tracing;
pub use trie::{BackoffTrie, NgramEntry, NodeId};
pub use word::{DefaultTokenizer, Phrase, Tokenizer, Word};
