// Terminal-facing flow: decides between listing collections and exporting
// one, prints results and owns the progress bar. Network and disk work is
// delegated to `api` and `export`.

use std::io::Write;
use std::process::ExitCode;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::api::{ApiClient, Collection, Transport};
use crate::config::Settings;
use crate::error::{ExportError, Result};
use crate::export::{ExportSummary, Exporter};

/// How a run ended, when it did not fail.
#[derive(Debug)]
pub enum Outcome {
    Exported(ExportSummary),
    /// No collection was given; this many collections were printed.
    CollectionsListed(usize),
}

impl Outcome {
    /// Listing mode is informational but still exits non-zero.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Outcome::Exported(_) => ExitCode::SUCCESS,
            Outcome::CollectionsListed(_) => ExitCode::FAILURE,
        }
    }
}

/// Per-article progress bar on stderr.
pub fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_bar} {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

/// Run one export (or collection listing) as described by `settings`.
/// Collection listings and hints are written to `out`.
pub fn run<T: Transport, W: Write>(
    settings: &Settings,
    api: &ApiClient<T>,
    out: &mut W,
    progress: ProgressBar,
) -> Result<Outcome> {
    let Some(collection_id) = settings.collection.as_deref() else {
        warn!("No collection specified");
        return list_collections(api, out);
    };

    let directory = &settings.output_dir;
    // Fails before any API call. The exporter's exclusive create is the
    // authoritative check.
    if directory.exists() {
        return Err(ExportError::DirectoryExists(directory.clone()));
    }

    info!("Starting Help Scout Docs export");
    let article_ids = api.list_article_ids(collection_id)?;
    info!("Found {} article IDs", article_ids.len());

    let summary = Exporter::new(api)
        .with_progress(progress)
        .export(&article_ids, directory)?;
    info!(
        "Saved all {} articles into {}",
        summary.files.len(),
        summary.directory.display()
    );

    Ok(Outcome::Exported(summary))
}

fn list_collections<T: Transport, W: Write>(api: &ApiClient<T>, out: &mut W) -> Result<Outcome> {
    info!("Fetching collection information");
    let collections = api.list_collections()?;
    if collections.is_empty() {
        return Err(ExportError::NoCollections);
    }

    print_collections(&collections, out)?;
    Ok(Outcome::CollectionsListed(collections.len()))
}

/// Print each collection as `<id>: <pretty JSON>` followed by a usage hint.
pub fn print_collections<W: Write>(collections: &[Collection], out: &mut W) -> Result<()> {
    writeln!(out, "Found collections:")?;
    for collection in collections {
        let json = serde_json::to_string_pretty(collection)?;
        writeln!(out, "{}: {}", collection.id, json)?;
    }
    writeln!(out, "Please specify a collection ID with --collection")?;
    Ok(())
}
