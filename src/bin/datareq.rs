use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use datareq::error::RequestError;
use datareq::output::JsonOutput;
use datareq::request::Request;

#[derive(Parser)]
#[command(name = "datareq")]
#[command(about = "Inspect serialized data-management requests")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Print the one-line-per-sub-request digest")]
    Digest(PathArgs),
    #[command(about = "Print the full request as JSON")]
    Inspect(PathArgs),
    #[command(about = "Print empty/done flags per type and overall")]
    Status(PathArgs),
    #[command(about = "Validate that a request document parses")]
    Check(PathArgs),
}

#[derive(Args)]
struct PathArgs {
    path: String,
}

#[derive(Serialize)]
struct StatusReport {
    types: BTreeMap<String, TypeStatus>,
    empty: bool,
    done: bool,
}

#[derive(Serialize)]
struct TypeStatus {
    sub_requests: usize,
    empty: bool,
    done: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<RequestError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &RequestError) -> u8 {
    match error {
        RequestError::MalformedDocument(_) | RequestError::MalformedPayload(_) => 2,
        RequestError::Filesystem(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Digest(args) => {
            let request = load(&args.path)?;
            JsonOutput::print_text(&request.digest()).into_diagnostic()
        }
        Commands::Inspect(args) => {
            let request = load(&args.path)?;
            JsonOutput::print(&request).into_diagnostic()
        }
        Commands::Status(args) => {
            let request = load(&args.path)?;
            let report = status_report(&request)?;
            JsonOutput::print(&report).into_diagnostic()
        }
        Commands::Check(args) => {
            load(&args.path)?;
            JsonOutput::print_text("ok").into_diagnostic()
        }
    }
}

fn load(path: &str) -> miette::Result<Request> {
    if !Path::new(path).exists() {
        return Err(miette::Report::msg(format!("no such file: {path}")));
    }
    Ok(Request::parse(path)?)
}

fn status_report(request: &Request) -> miette::Result<StatusReport> {
    let mut types = BTreeMap::new();
    for rtype in request.sub_request_types() {
        let status = TypeStatus {
            sub_requests: request.num_sub_requests(&rtype),
            empty: request.is_type_empty(&rtype)?,
            done: request.is_type_done(&rtype)?,
        };
        types.insert(rtype, status);
    }
    Ok(StatusReport {
        types,
        empty: request.is_empty()?,
        done: request.is_done()?,
    })
}
