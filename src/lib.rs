//! Prin - Print the contents of codebases, repositories and websites for LLMs.
//!
//! Prin walks one or more roots, decides which entries qualify, and prints
//! each qualifying file in a format suited to feeding language models. The
//! same filter contract applies whether entries come from a local directory,
//! a GitHub repository or the documents an `llms.txt` manifest links to.
//!
//! # Quick Start
//!
//! ```no_run
//! use prin::builder::Prin;
//!
//! // Print every Python file under src/, tests included
//! let output = Prin::new()
//!     .pattern("py")
//!     .path("src")
//!     .include_tests(true)
//!     .render()
//!     .unwrap();
//!
//! print!("{output}");
//! ```
//!
//! # Modules
//!
//! - [`pattern`] - Classify a pattern as glob, regex or extension
//! - [`filter`] - Exclusion categories and the filter pipeline
//! - [`ignore_rules`] - `.gitignore`-style rules, last match wins
//! - [`binary`] - Binary detection: signatures, then a text heuristic
//! - [`emptiness`] - Tree-sitter based "nothing but imports" detection
//! - [`display`] - Display paths that follow how a root was typed
//! - [`source`] - Filesystem, GitHub and website adapters
//! - [`printer`] - Budgeted printing of walked entries
//! - [`builder`] - Fluent API and multi-source runs

pub mod pattern;
pub mod defaults;
pub mod filter;
pub mod ignore_rules;
pub mod binary;
pub mod emptiness;
pub mod display;
pub mod budget;
pub mod context;
pub mod source;
pub mod output;
pub mod printer;
pub mod builder;
pub mod errors;

// Re-export key types at crate root for convenience
pub use budget::FileBudget;
pub use builder::{Prin, RootToken, RunReport};
pub use context::{Context, DepthLimits};
pub use display::resolve_display;
pub use errors::PrinError;
pub use filter::{Category, FilterPipeline, FilterResult};
pub use ignore_rules::{IgnoreEngine, IgnoreRuleSet};
pub use output::OutputTag;
pub use pattern::{classify, PatternKind};
pub use printer::{Printer, RootOutcome};
pub use source::{Entry, EntryKind, SourceAdapter};
