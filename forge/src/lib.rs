//! nginx-forge library.
//!
//! Builds nginx with statically linked OpenSSL and PCRE from pinned,
//! signature-verified source releases, and skips the whole build when the
//! installed server already reports the requested versions. It backs the
//! `nginx-forge` CLI and can be driven programmatically with stub
//! collaborators for testing.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Configuration file loading and override resolution
//! - [`error`] - Error types
//! - [`exec`] - External command execution seam
//! - [`fetch`] - Source download, signature verification, and extraction
//! - [`orchestrator`] - The `ensure_built` entry point
//! - [`outcome`] - Structured run result
//! - [`output`] - JSON rendering of results and failures
//! - [`probe`] - Installed-binary version introspection
//! - [`request`] - Build requests and version triples
//! - [`sequencer`] - Two-stage OpenSSL and nginx build
//! - [`source`] - Source locations and workspace naming

pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod orchestrator;
pub mod outcome;
pub mod output;
pub mod probe;
pub mod request;
pub mod sequencer;
pub mod source;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
