//! Cueflow Expression - Trigger expression parsing
//!
//! Turns trigger expression strings such as `"#video.start + 10"` or
//! `".graphics & !$preview"` into a closed, typed expression tree:
//! - arithmetic operators `+ - * /` over times and durations
//! - logical operators `& |` and prefix `!` over instance sets
//! - references `#objId`, `.className`, `$layerName`, each with an
//!   optional `.start`/`.end`/`.duration` hook
//!
//! Evaluation lives in `cueflow-resolver`, which has access to the
//! partially resolved timeline the references point into.

pub mod ast;
pub mod error;
pub mod parse;

mod token;

pub use ast::*;
pub use error::*;
pub use parse::parse;
