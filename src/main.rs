// Entrypoint for the CLI application.
// - Keeps `main` small: resolve settings, create an API client and hand
//   both to `ui::run`.
// - Errors are printed once here and turned into exit status 1.

use std::process::ExitCode;

use anyhow::Context;
use indicatif::ProgressBar;
use export_help_scout_docs::{
    api::ApiClient,
    cli::{setup_logging, Cli},
    ui::{self, Outcome},
};

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    let progress = ui::progress_bar();
    setup_logging(cli.verbose, progress.clone());

    match run(cli, progress) {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, progress: ProgressBar) -> anyhow::Result<Outcome> {
    let settings = cli.into_settings()?;
    let api = ApiClient::from_settings(&settings).context("Failed to build HTTP client")?;

    let stdout = std::io::stdout();
    let outcome = ui::run(&settings, &api, &mut stdout.lock(), progress)?;
    Ok(outcome)
}
