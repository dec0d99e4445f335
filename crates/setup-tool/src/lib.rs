//! setup-tool CLI library.
//!
//! Argument parsing, error rendering and tracing setup for the `setup-tool`
//! binary. The installation logic itself lives in `setup-tool-core`.

pub mod cli;
pub mod tracing;
