//! Kconfig dump translation: reads a line-oriented symbol catalogue
//! (component H), rewrites dependency expressions into target formulas
//! (component I), and emits the per-symbol propositional model (component
//! J).

pub mod model;
pub mod reader;
pub mod rewriter;
pub mod translator;

pub use model::{Catalogue, Choice, Item, SymbolType};
pub use translator::TranslatedModel;
