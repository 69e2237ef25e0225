use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use pokin_core::ReportKernel;
use pokin_http::config::ServiceConfig;
use pokin_store::MySqlReportSource;

#[derive(Parser)]
#[command(name = "pokin", about = "Pohon kinerja tagging reports")]
struct Cli {
    /// Indent the JSON output.
    #[arg(long, global = true)]
    pretty: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tag report for one tag and year.
    Tag {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        year: i32,
    },
    /// Indicator tree for a program-unggulan code.
    Detail { code: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = ServiceConfig::from_env().context("loading configuration")?;
    let source = MySqlReportSource::connect_lazy(&config.database_url, &config.pool)?;
    pokin_http::wait_for_source(&source, Duration::from_secs(10), Duration::from_secs(30)).await?;
    let kernel = ReportKernel::new(Arc::new(source), config.enrichment);

    match cli.command {
        Command::Tag { tag, year } => {
            let report = kernel.tag_report(&tag, year).await?;
            print_json(&report, cli.pretty)?;
        }
        Command::Detail { code } => {
            let nodes = kernel.indicator_tree(&code).await?;
            print_json(&nodes, cli.pretty)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
