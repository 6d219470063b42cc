//! Report renderers for upload run results.
//!
//! - [`terminal`] — colored output with summary box and per-host tables;
//!   respects `--verbose` / `--quiet`.
//!
//! `--report json` has no renderer here: the outcome list serializes
//! straight through `serde_json` in `main`.

pub mod terminal;
