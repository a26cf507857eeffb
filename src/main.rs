// csp-validator
//
// Command-line entry point: load settings, validate a project's hosts (or
// the hosts given on the command line), and exit non-zero when any page
// violates its own policy.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;

use csp_validator::{Config, HostOutcome, Validator};

#[derive(Parser, Debug)]
#[command(name = "csp-validator", version, about, long_about = None)]
struct Cli {
    /// Project whose hosts file is validated
    #[arg(short, long)]
    project: Option<String>,

    /// Path to the YAML settings file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Print violation reports as JSON lines
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Hosts to validate instead of the project's hosts file
    hosts: Vec<String>,
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = Config::load(cli.settings.as_deref())?;
    let validator = Validator::new(config)?;

    let results = if !cli.hosts.is_empty() {
        validator.validate_hosts(cli.hosts.as_slice())
    } else if let Some(project) = &cli.project {
        info!("Validate HTTP content for project {}", project);
        validator.run(project)?
    } else {
        return Err("a project or at least one host must be specified".into());
    };

    let mut failed = false;
    for (_, result) in &results {
        if let Ok(HostOutcome::Checked { verdict, .. }) = result {
            if verdict.valid {
                continue;
            }
            failed = true;
            if cli.json {
                for report in &verdict.reports {
                    println!("{}", serde_json::to_string(report)?);
                }
            }
        }
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
