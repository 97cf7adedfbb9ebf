// Process-wide settings, resolved once at startup and handed to each
// component explicitly. Nothing here reads the environment on its own;
// `cli` does that and builds a `Settings`.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;

use crate::api::Credential;

/// Base URL of the public Help Scout Docs API.
pub const DEFAULT_API_URL: &str = "https://docsapi.helpscout.net";

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "HELPSCOUTAUTH";

/// Pause between consecutive API calls and between retry attempts.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);

/// Total attempts per request, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credential: Credential,
    /// `None` switches the run into collection-listing mode.
    pub collection: Option<String>,
    pub output_dir: PathBuf,
    pub api_url: String,
    pub request_delay: Duration,
    pub max_attempts: u32,
}

impl Settings {
    /// Settings with the default API URL, pacing and retry budget.
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            collection: None,
            output_dir: default_output_dir(),
            api_url: DEFAULT_API_URL.to_string(),
            request_delay: DEFAULT_REQUEST_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// `help-scout-export-<local timestamp>` in the current directory.
pub fn default_output_dir() -> PathBuf {
    let stamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.6f");
    PathBuf::from(format!("help-scout-export-{}", stamp))
}
