//! Runs one handler against a serverless event, the way a function runtime
//! would: event JSON in, response envelope JSON out.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use espn_scrape::config::{self, ScrapeConfig};
use espn_scrape::handler::Endpoint;
use espn_scrape::http_client::HttpSource;
use espn_scrape::logging;
use espn_scrape::params::ApiRequest;

#[derive(Parser)]
#[command(name = "invoke")]
#[command(about = "Invoke the scores or schedule handler with an event", long_about = None)]
struct Cli {
    /// Handler to run: scores or schedule
    endpoint: Endpoint,
    /// Event JSON file; stdin when omitted
    #[arg(long, short)]
    event: Option<PathBuf>,
    /// Pretty-print the response envelope
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    config::load_dotenv();
    let cli = Cli::parse();
    logging::init_logging(&ScrapeConfig::from_env().log_level)?;

    let raw = match &cli.event {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("read event from stdin")?;
            buf
        }
    };
    let event: ApiRequest = if raw.trim().is_empty() {
        ApiRequest::default()
    } else {
        serde_json::from_str(&raw).context("parse event json")?
    };

    let response = cli.endpoint.handle(&event, &HttpSource);
    let out = if cli.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{out}");
    Ok(())
}
