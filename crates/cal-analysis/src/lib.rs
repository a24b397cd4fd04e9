//! Post-parse analysis for C/AL documents.
//!
//! The central artifact is the [`symbols::SymbolTable`]: a scope tree
//! built in one walk over the AST, supporting case-insensitive,
//! position-aware lookup. Feature providers (completion, definition,
//! hover) query it instead of re-walking the AST.

pub mod symbols;

pub use symbols::{Symbol, SymbolKind, SymbolTable};
