mod config;
mod forge;
mod resource;

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use forge::GitHubClient;
use resource::{CheckRequest, Checker, Fetcher, InRequest, OutRequest, Publisher};

/// Concourse resource that exposes open GitHub pull requests
/// as versions, fetches them, and reports build statuses back to their commits.
///
/// Reads a JSON request on stdin and writes a JSON response on stdout.
/// Installed as /opt/resource/{check,in,out}, the command is taken from the
/// executable name.
#[derive(Parser, Debug)]
#[command(name = "pr-resource", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Emit versions for open pull requests newer than the given one
    Check,
    /// Fetch the pull request named by the requested version
    In {
        /// Directory to fetch the pull request into
        destination: PathBuf,
    },
    /// Report a commit status for a previously fetched pull request
    Out {
        /// Directory holding the build's inputs
        sources: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse_from(dispatch_args(std::env::args_os()));
    debug!(command = ?cli.command, "starting");

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", error_chain(err.as_ref()));
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Check => {
            let request: CheckRequest = resource::read_request(io::stdin().lock())?;
            let forge = GitHubClient::from_source(&request.source)?;
            let versions = Checker::new(&forge)
                .run(&request)
                .instrument(info_span!("check"))
                .await?;
            resource::write_response(io::stdout().lock(), &versions)?;
        }
        Command::In { destination } => {
            let request: InRequest = resource::read_request(io::stdin().lock())?;
            let forge = GitHubClient::from_source(&request.source)?;
            let response = Fetcher::new(&forge)
                .run(&destination, &request)
                .instrument(info_span!("in"))
                .await?;
            resource::write_response(io::stdout().lock(), &response)?;
        }
        Command::Out { sources } => {
            let request: OutRequest = resource::read_request(io::stdin().lock())?;
            let forge = GitHubClient::from_source(&request.source)?;
            let response = Publisher::new(&forge)
                .run(&sources, &request)
                .instrument(info_span!("out"))
                .await?;
            resource::write_response(io::stdout().lock(), &response)?;
        }
    }
    Ok(())
}

/// Render an error followed by its `source()` causes, joined by ": ".
/// Causes whose text the message already carries are not repeated.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        cause = inner.source();
    }
    message
}

/// When the binary is invoked as `check`, `in` or `out` (the Concourse
/// layout), splice that name in as the subcommand.
fn dispatch_args<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    let mut args: Vec<OsString> = args.into_iter().collect();

    let invoked_as = args
        .first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| matches!(*name, "check" | "in" | "out"))
        .map(OsString::from);

    if let Some(name) = invoked_as {
        args.insert(1, name);
    }
    args
}
