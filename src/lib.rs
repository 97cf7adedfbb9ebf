// Library root
// -----------
// Exports a Help Scout Docs collection to one JSON file per article. The
// binary (`main.rs`) wires these modules together.
//
// Module responsibilities:
// - `api`: HTTP access to the Docs API (auth, retries, pagination).
// - `export`: output directory handling and article files.
// - `ui`: the run itself: listing or exporting, progress and printing.
// - `cli`: argument parsing and logging setup.
// - `config`: resolved settings and defaults.
// - `error`: the shared error type.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod ui;

#[cfg(test)]
mod testing;

pub use error::{ExportError, Result};
