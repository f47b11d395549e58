//! # ccheck
//!
//! A static analyzer for C and C++ source code. It reconstructs enough of
//! the language semantics to reason about a translation unit symbolically
//! and emits diagnostics (severity, certainty, location, message, stable
//! id) for developers and CI.
//!
//! ## Pipeline
//!
//! For each translation unit, in order:
//!
//! 1. **Preprocessing** — include resolution, configuration enumeration
//!    over `#if`/`#ifdef` branches, macro expansion, inline-suppression
//!    extraction, checksum computation ([`preprocessor`]).
//! 2. **Tokenization** — a doubly-linked token arena with bracket links
//!    and an AST overlay ([`tokens`]), normalized in two phases by the
//!    [`tokenizer`].
//! 3. **Symbols** — scopes, functions and variables ([`symbols`]).
//! 4. **Value flow** — symbolic values attached to expression tokens,
//!    with bounds, provenance and error paths ([`valueflow`]).
//! 5. **Checks** — thin consumers of the analyzed state ([`checks`]).
//! 6. **CTU** — per-TU call summaries joined into a whole-program call
//!    graph after every TU finished ([`ctu`]).
//!
//! Analyzed TUs are cached in the build directory keyed by a checksum
//! over the preprocessed tokens and tool state ([`analyzerinfo`]), so an
//! unchanged TU replays its stored diagnostics instead of re-analyzing.
//!
//! ## Library usage
//!
//! ```no_run
//! use ccheck::analyzerinfo::AnalyzerInformation;
//! use ccheck::checks::builtin_checks;
//! use ccheck::config::{Project, Settings};
//! use ccheck::ctu::CtuInfo;
//! use ccheck::driver::Checker;
//! use ccheck::output::CollectingLogger;
//!
//! let project = Project::new();
//! let settings = Settings::default();
//! let checks = builtin_checks();
//! let mut logger = CollectingLogger::default();
//! let mut checker = Checker::new(&project, &settings, &checks, &mut logger, true);
//! let mut ctu = CtuInfo::new("example.c", 0, None);
//! checker.check_content(&mut ctu, "void f() { int x; int y = x; }");
//! assert_eq!(logger.errors[0].id, "uninitvar");
//! ```

pub mod analyzerinfo;
pub mod checks;
pub mod cli;
pub mod config;
pub mod ctu;
pub mod diagnostics;
pub mod driver;
pub mod dump;
pub mod errors;
pub mod executor;
pub mod observability;
pub mod output;
pub mod preprocessor;
pub mod symbols;
pub mod tokenizer;
pub mod tokens;
pub mod valueflow;

/// Tool version reported in output streams and folded into checksums.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::config::{Project, Settings};
pub use crate::diagnostics::{Certainty, ErrorMessage, FileLocation, Severity};
pub use crate::errors::InternalError;
