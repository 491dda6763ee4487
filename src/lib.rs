//! # noet-core
//!
//! The parsing and postprocessing core of a Sphinx/snooty-style
//! documentation build system: a reStructuredText state-machine parser,
//! a giza YAML fragment loader (steps, extracts, releases), a
//! cross-reference target database with intersphinx lookup, and a
//! postprocessor that resolves includes, refs, and the project toctree
//! across an entire page set.
//!
//! ## Scope
//!
//! This crate is the core only. The CLI front-end, a storage-backed
//! result sink, the Language Server Protocol driver, and the
//! intersphinx inventory fetcher are external collaborators; this
//! crate represents them solely through the [`project::ResultSink`] and
//! [`project::MetadataSink`] trait interfaces and the data types they
//! consume.
//!
//! ## Data flow
//!
//! ```text
//! source files -> block parser -> per-page AST + pending tasks + static assets
//!              -> page database (raw) -> postprocessor
//!              -> page database (postprocessed) -> result sink
//! ```
//!
//! ## Module guide
//!
//! - [`fileid`]: the two derived views of a source path (slug, posix string).
//! - [`diagnostic`]: the per-file diagnostic model and severities.
//! - [`ast`]: the page AST (`Node`/`NodeData`) shared by every parser.
//! - [`statemachine`]: the reStructuredText block parser.
//! - [`inline`]: inline markup (emphasis, roles, literal text).
//! - [`directives`]: directive and role dispatch tables.
//! - [`giza`]: the YAML fragment format (steps, extracts, releases).
//! - [`spec`]: the directive/role registry and option validators.
//! - [`intersphinx`]: parsing another project's published inventory.
//! - [`target`]: the cross-reference target database.
//! - [`postprocess`]: the whole-project resolution and toctree pass.
//! - [`cache`]: the incremental on-disk parse cache.
//! - [`pagedb`]: the in-memory page store and background flush worker.
//! - [`assets`]: static asset hashing and the expensive-operation cache.
//! - [`config`]: project configuration loading.
//! - [`project`]: ties configuration, the page database, and the cache
//!   together, and defines the sink traits above.
//! - [`error`]: the crate-wide fatal error type.
//!
//! With the `watch` feature, [`watch`] adds a filesystem-watching
//! incremental rebuild driver for local development use.

pub mod ast;
pub mod assets;
pub mod cache;
pub mod config;
pub mod diagnostic;
pub mod directives;
pub mod error;
pub mod fileid;
pub mod giza;
pub mod inline;
pub mod intersphinx;
pub mod page;
pub mod pagedb;
pub mod postprocess;
pub mod project;
pub mod spec;
pub mod statemachine;
pub mod target;
#[cfg(feature = "watch")]
pub mod watch;

pub use error::*;
