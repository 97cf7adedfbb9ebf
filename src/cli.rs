// Command-line surface: parses arguments, resolves them into `Settings`
// and configures logging.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Arg, ArgAction, Command, CommandFactory, FromArgMatches, Parser};
use indicatif::ProgressBar;
use tracing_subscriber::fmt::MakeWriter;

use crate::api::Credential;
use crate::config::{
    default_output_dir, Settings, DEFAULT_API_URL, DEFAULT_MAX_ATTEMPTS, TOKEN_ENV,
};
use crate::error::{ExportError, Result};

/// Export from Help Scout Docs
#[derive(Debug, Parser)]
#[command(name = "export-help-scout-docs")]
#[command(version, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Help Scout Docs API token. Prefer the HELPSCOUTAUTH environment variable
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,

    /// Help Scout collection ID. If this isn't set, print the list of collections
    #[arg(long)]
    pub collection: Option<String>,

    /// Directory where the export is saved. Must not exist yet. Defaults to
    /// 'help-scout-export-<current datetime>' in the current directory
    #[arg(long = "output_dir", value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Base URL of the Docs API
    #[arg(long, default_value = DEFAULT_API_URL, hide = true)]
    pub api_url: String,

    /// Seconds to wait between API requests
    #[arg(long, value_name = "SECS", default_value = "1", value_parser = parse_delay)]
    pub request_delay: Duration,

    /// Attempts per request before giving up
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    /// Increase log verbosity (repeatable)
    #[arg(long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The derived command plus a `-v/--version` flag in place of clap's
    /// default `-V`.
    pub fn command_with_version() -> Command {
        Cli::command().arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .help("Print version")
                .action(ArgAction::Version),
        )
    }

    /// Parse the process arguments, exiting on usage errors, `--help` and
    /// `--version`.
    pub fn parse_args() -> Self {
        Self::try_parse_args_from(std::env::args_os()).unwrap_or_else(|err| err.exit())
    }

    pub fn try_parse_args_from<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command_with_version().try_get_matches_from(args)?;
        Self::from_arg_matches(&matches)
    }

    /// Resolve the parsed arguments into run settings.
    pub fn into_settings(self) -> Result<Settings> {
        let credential = resolve_token(self.token, std::env::var(TOKEN_ENV).ok())?;
        Ok(Settings {
            credential,
            collection: self.collection,
            output_dir: self.output_dir.unwrap_or_else(default_output_dir),
            api_url: self.api_url,
            request_delay: self.request_delay,
            max_attempts: self.max_attempts,
        })
    }
}

/// The `--token` value, or the environment token when the flag is absent
/// or empty.
pub fn resolve_token(flag: Option<String>, env: Option<String>) -> Result<Credential> {
    flag.filter(|token| !token.is_empty())
        .or_else(|| env.filter(|token| !token.is_empty()))
        .map(Credential::new)
        .ok_or(ExportError::MissingCredential)
}

fn parse_delay(value: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = value.parse().map_err(|e| format!("{}", e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{}", e))
}

/// Log sink that hides `progress` while an event is written to stderr.
#[derive(Clone)]
pub struct ProgressAwareStderr {
    progress: ProgressBar,
}

impl ProgressAwareStderr {
    pub fn new(progress: ProgressBar) -> Self {
        Self { progress }
    }
}

impl<'a> MakeWriter<'a> for ProgressAwareStderr {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter {
            progress: self.progress.clone(),
            buf: Vec::new(),
        }
    }
}

/// Buffers one formatted event and flushes it to stderr on drop.
pub struct EventWriter {
    progress: ProgressBar,
    buf: Vec<u8>,
}

impl Write for EventWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.buf);
        // Suspending redraws the bar, so only do it while an export runs.
        let active = !self.progress.is_finished() && self.progress.length().unwrap_or(0) > 0;
        if active {
            self.progress.suspend(|| {
                let _ = io::stderr().write_all(&buf);
            });
        } else {
            let _ = io::stderr().write_all(&buf);
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `verbosity`.
/// Log lines are written around `progress` so they do not break the bar.
pub fn setup_logging(verbosity: u8, progress: ProgressBar) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbosity {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(ProgressAwareStderr::new(progress))
        .init();
}
