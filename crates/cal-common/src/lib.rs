//! Shared leaf types for the C/AL language front end.
//!
//! Everything here is consumed by every other crate in the workspace:
//! byte-offset spans with on-demand line/column lookup, the token model
//! produced by the lexer, and the diagnostic type all stages report
//! problems through.

pub mod diagnostic;
pub mod span;
pub mod token;
