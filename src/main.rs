mod analyzer;
mod error;
mod models;
mod output;
mod scraper;

use analyzer::{ResultsAnalysis, ResultsAnalyzer};
use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use error::ResultsResult;
use log::error;
use models::{Config, DataSourceMode};
use scraper::ResultsScraper;
use std::path::Path;

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("bc-results")
        .version("0.1")
        .about("Builds map and seat-count CSV files from an election results feed")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("URL")
                .help("Fetch results from this URL instead of the configured one"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Read results from a local CSV snapshot instead of fetching"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Turn on debug logging"),
        )
        .get_matches();

    init_logging(matches.get_flag("verbose"));

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let mut config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please review {} and run the program again.", config_file);
        return Ok(());
    };

    if let Some(url) = matches.get_one::<String>("url") {
        config.source_url = url.clone();
        config.data_source_mode = DataSourceMode::Internet;
    }
    if let Some(input) = matches.get_one::<String>("input") {
        config.local_file = Some(input.clone());
        config.data_source_mode = DataSourceMode::Local;
    }
    config.validate()?;

    let (analysis, failures) = run(&config).await?;
    print_summary(&analysis);

    if failures > 0 {
        return Err(anyhow!("{} output file(s) could not be written", failures));
    }
    println!("\n✅ Done!");
    Ok(())
}

/// Fetch, analyze and write every output; returns the analysis and how many writes failed.
async fn run(config: &Config) -> ResultsResult<(ResultsAnalysis, usize)> {
    // Fetch and parse before touching any output
    let rows = ResultsScraper::new().load(config).await?;
    println!("   ✅ Read {} candidate rows", rows.len());

    let analysis = ResultsAnalyzer::new(config).analyze(&rows);
    println!("🗳️  Resolved leaders for {} districts", analysis.leaders.len());

    let failures = write_outputs(config, &analysis);
    Ok((analysis, failures))
}

/// Write every output independently; returns how many failed.
fn write_outputs(config: &Config, analysis: &ResultsAnalysis) -> usize {
    let mut results = vec![
        (
            config.outputs.map.as_str(),
            output::write_map(Path::new(&config.outputs.map), &analysis.map, config.leader_party),
        ),
        (
            config.outputs.seats.as_str(),
            output::write_seats(Path::new(&config.outputs.seats), &analysis.seats),
        ),
    ];
    for (name, path, table) in &analysis.regions {
        println!("📍 Region {}: {} districts", name, table.rows.len());
        results.push((
            path.as_str(),
            output::write_map(Path::new(path), table, config.leader_party),
        ));
    }

    let mut failures = 0;
    for (path, result) in results {
        match result {
            Ok(()) => println!("💾 Wrote {}", path),
            Err(e) => {
                error!("❌ Could not write {}: {}", path, e);
                failures += 1;
            }
        }
    }
    failures
}

fn print_summary(analysis: &ResultsAnalysis) {
    println!("\n📊 SEATS ({})", analysis.seats.region);
    println!("==========");
    for (category, seats) in &analysis.seats.counts {
        println!("   {:<30} {:>3}", category, seats);
    }
    println!("   {:<30} {:>3}", "Total", analysis.seats.total());

    let unresolved = analysis
        .leaders
        .iter()
        .filter(|l| l.leading_candidate.is_none())
        .count();
    if unresolved > 0 {
        println!("   ⚠️  {} district(s) without a resolvable leader", unresolved);
    }
}
