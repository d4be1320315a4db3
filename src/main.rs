//! Command-line front end: one-off scrapes written to JSON files, or the
//! local development server.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use espn_scrape::config::{self, ScrapeConfig};
use espn_scrape::http_client::HttpSource;
use espn_scrape::schedule::{self, DEFAULT_TEAM_NAME_LONG, DEFAULT_TEAM_SLUG};
use espn_scrape::server::{self, DEFAULT_HOST, DEFAULT_PORT};
use espn_scrape::{logging, render, scores};

#[derive(Parser)]
#[command(name = "espn_scrape")]
#[command(about = "Scrape period scores and team schedules from ESPN pages", long_about = None)]
struct Cli {
    /// Log at debug level regardless of LOG_LEVEL
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape quarter-by-quarter scores (including OT) from a game page
    Scores {
        /// Sport segment used in ESPN URLs (e.g. nfl, nba)
        sport: String,
        /// ESPN gameId to scrape (e.g. 401772834)
        game_id: String,
        #[arg(long, default_value = "game_scores.json")]
        output: PathBuf,
        /// Print formatted scores to stdout
        #[arg(long)]
        print: bool,
    },
    /// Scrape upcoming games from an NFL team schedule page
    Schedule {
        #[arg(long, default_value = DEFAULT_TEAM_SLUG)]
        team_slug: String,
        #[arg(long, default_value = DEFAULT_TEAM_NAME_LONG)]
        team_name_long: String,
        #[arg(long, default_value = "schedule.json")]
        output: PathBuf,
        /// Print formatted schedule to stdout
        #[arg(long)]
        print: bool,
        /// Run the local server instead of scraping once
        #[arg(long = "server")]
        run_server: bool,
        #[command(flatten)]
        bind: BindArgs,
    },
    /// Run the local development server
    Serve {
        #[command(flatten)]
        bind: BindArgs,
    },
}

#[derive(Args)]
struct BindArgs {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> Result<()> {
    config::load_dotenv();
    let cli = Cli::parse();
    let config = ScrapeConfig::from_env();
    let level = if cli.verbose { "DEBUG" } else { config.log_level.as_str() };
    logging::init_logging(level)?;

    match cli.command {
        Commands::Scores {
            sport,
            game_id,
            output,
            print,
        } => run_scores(&sport, &game_id, &output, print),
        Commands::Schedule {
            run_server: true,
            bind,
            ..
        } => server::serve(&bind.host, bind.port),
        Commands::Schedule {
            team_slug,
            team_name_long,
            output,
            print,
            ..
        } => run_schedule(&team_slug, &team_name_long, &output, print),
        Commands::Serve { bind } => server::serve(&bind.host, bind.port),
    }
}

fn run_scores(sport: &str, game_id: &str, output: &Path, print: bool) -> Result<()> {
    let url = scores::game_url(sport, game_id);
    let outcome = scores::scrape_game_scores(&HttpSource, &url)
        .with_context(|| format!("scrape scores from {url}"))?;

    if print {
        print!("{}", render::scores_report(&outcome));
    }
    write_json(output, &outcome)?;
    println!("\nData saved to {}", output.display());
    Ok(())
}

fn run_schedule(team_slug: &str, team_name_long: &str, output: &Path, print: bool) -> Result<()> {
    let url = schedule::schedule_url(team_slug, team_name_long);
    println!("\nURL: {url}\n");

    let games = schedule::scrape_schedule(&HttpSource, &url, Some(team_name_long))
        .with_context(|| format!("scrape schedule from {url}"))?;
    info!(count = games.len(), "schedule scraped");

    if print {
        print!("{}", render::schedule_report(&games));
    }
    write_json(output, &games)?;
    println!("\nData saved to {}", output.display());
    println!("Found {} upcoming game(s)", games.len());
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value).context("serialize output")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))
}
