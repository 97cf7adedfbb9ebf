// Article export: creates the output directory, fetches every article by
// ID and writes each full API response to `<slug>[-n].json`.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;

use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::api::{ApiClient, ArticleDocument, Transport};
use crate::error::{ExportError, Result};

/// What an export run left on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub directory: PathBuf,
    /// Written files, in article order.
    pub files: Vec<PathBuf>,
}

/// First path of the form `<base>.<ext>`, `<base>-1.<ext>`, `<base>-2.<ext>`,
/// ... that does not exist in `directory`.
pub fn unique_filename(directory: &Path, base: &str, extension: &str) -> PathBuf {
    let mut candidate = directory.join(format!("{}.{}", base, extension));
    let mut counter = 1;
    while candidate.exists() {
        candidate = directory.join(format!("{}-{}.{}", base, counter, extension));
        counter += 1;
    }
    candidate
}

/// Create `directory`, failing if anything already exists at that path.
/// The parent must exist.
pub fn create_output_dir(directory: &Path) -> Result<()> {
    debug!(directory = %directory.display(), "Creating directory");
    match fs::create_dir(directory) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(ExportError::DirectoryExists(directory.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn checked_slug(slug: &str) -> Result<&str> {
    let bad = slug.is_empty()
        || slug == "."
        || slug == ".."
        || slug.contains(['/', '\\'])
        || slug.contains('\0');
    if bad {
        return Err(ExportError::InvalidSlug(slug.to_string()));
    }
    Ok(slug)
}

/// Write `document` pretty-printed to a fresh file named after its slug.
pub fn write_article(directory: &Path, document: &ArticleDocument) -> Result<PathBuf> {
    let slug = checked_slug(document.slug()?)?;
    let path = unique_filename(directory, slug, "json");

    let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document.as_value())?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(path)
}

/// Fetches articles one at a time and saves them into a new directory.
pub struct Exporter<'a, T> {
    client: &'a ApiClient<T>,
    progress: ProgressBar,
}

impl<'a, T: Transport> Exporter<'a, T> {
    pub fn new(client: &'a ApiClient<T>) -> Self {
        Self {
            client,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Export `article_ids` into `directory`, which must not exist yet.
    ///
    /// Stops at the first error; files written up to that point are left
    /// in place.
    pub fn export(&self, article_ids: &[String], directory: &Path) -> Result<ExportSummary> {
        create_output_dir(directory)?;

        self.progress.set_length(article_ids.len() as u64);
        match self.save_all(article_ids, directory) {
            Ok(files) => {
                self.progress.finish_and_clear();
                Ok(ExportSummary {
                    directory: directory.to_path_buf(),
                    files,
                })
            }
            Err(err) => {
                self.progress.abandon();
                Err(err)
            }
        }
    }

    fn save_all(&self, article_ids: &[String], directory: &Path) -> Result<Vec<PathBuf>> {
        let total = article_ids.len();
        let mut files = Vec::with_capacity(total);

        for (index, article_id) in article_ids.iter().enumerate() {
            info!(article = %article_id, "Getting article ({}/{})", index + 1, total);
            thread::sleep(self.client.request_delay());

            let document = self.client.get_article(article_id)?;
            let path = write_article(directory, &document)?;
            debug!(path = %path.display(), "Saved article");

            files.push(path);
            self.progress.inc(1);
        }

        Ok(files)
    }
}
