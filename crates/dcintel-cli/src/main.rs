//! dcintel CLI
//!
//! - `analyze`: run the cross-border due-diligence pipeline for a set of countries
//! - `call`: issue one catalog tool call and print the raw response
//! - `tools`: list the catalog with parameter schemas

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dcintel_core::ToolId;
use dcintel_dispatch::{Dispatcher, HttpTransport, Tier};
use dcintel_planner::{Planner, PlannerConfig, Target};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod assign;
mod output;

#[derive(Parser)]
#[command(name = "dcintel")]
#[command(author, version, about = "Data-center market intelligence: due-diligence runs over the tool catalog")]
struct Cli {
    /// JSON config file (environment variables still override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Service tier: free or pro
    #[arg(long, global = true)]
    tier: Option<Tier>,

    /// More logging (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze target countries and rank them.
    ///
    /// Targets are ISO country codes, optionally with a candidate site:
    /// `DE`, `SG@1.35,103.82`.
    Analyze {
        #[arg(required = true, value_delimiter = ',')]
        targets: Vec<Target>,

        /// Session deadline in seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Print the full report as JSON instead of the summary table
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Issue a single tool call: `dcintel call get_news market=SG limit=5`.
    Call {
        tool: ToolId,

        /// Parameters as key=value
        params: Vec<String>,
    },

    /// List the tool catalog.
    Tools {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<PlannerConfig> {
    let mut config = PlannerConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(tier) = cli.tier {
        config.tier = tier;
    }
    tracing::debug!(base_url = %config.base_url, tier = ?config.tier, "configuration loaded");
    Ok(config)
}

fn transport(config: &PlannerConfig) -> Result<Arc<HttpTransport>> {
    let transport = HttpTransport::new(&config.base_url, config.request_timeout())?;
    Ok(Arc::new(transport))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Analyze {
            targets,
            deadline,
            json,
            out,
        } => {
            let mut config = load_config(&cli)?;
            if let Some(secs) = deadline {
                config.session_deadline_secs = *secs;
            }
            let transport = transport(&config)?;
            let planner = Planner::new(config, transport)?;
            let report = planner.run(targets).await?;

            let text = report.to_json_pretty()?;
            if let Some(path) = out {
                std::fs::write(path, &text)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                eprintln!(
                    "{} {}",
                    "wrote".green().bold(),
                    path.display().to_string().bold()
                );
            }
            if *json {
                println!("{text}");
            } else {
                output::print_report(&report);
            }
        }

        Commands::Call { tool, params } => {
            let config = load_config(&cli)?;
            let parameters = assign::parse_all(*tool, params)?;
            let dispatcher = Dispatcher::new(config.dispatch_config(), transport(&config)?);
            let response = dispatcher.dispatch(*tool, parameters).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if let Some((kind, reason)) = response.failure() {
                return Err(anyhow!("{tool} failed ({kind:?}): {reason}"));
            }
        }

        Commands::Tools { json } => {
            if *json {
                let catalog: Vec<_> = ToolId::ALL
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "name": t.name(),
                            "description": t.description(),
                            "path": t.path_template(),
                            "domain": t.domain(),
                            "params": t.params(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                output::print_catalog();
            }
        }
    }

    Ok(())
}
