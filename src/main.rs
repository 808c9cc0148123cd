//! xload - normalized archive loader CLI
//!
//! Main entry point for the xload command-line tool.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use xload::archive::{discover_inputs, for_each_member};
use xload::config::Config;
use xload::loader::{load_lines, LoadStats};
use xload::storage::Storage;
use xload::{cli, default_db_path, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_target(false)
        .without_time()
        .init();

    let config = Config::load();

    match &cli.command {
        Commands::Load(args) => cmd_load(&cli, &config, args),
        Commands::Completions(args) => cmd_completions(args.clone()),
    }
}

fn get_db_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.db
        .clone()
        .or_else(|| config.paths.db.clone())
        .unwrap_or_else(default_db_path)
}

fn cmd_load(cli: &Cli, config: &Config, args: &cli::LoadArgs) -> Result<()> {
    let db_path = get_db_path(cli, config);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let print_every = args.print_every.unwrap_or(config.load.print_every).max(1);
    let quiet = cli.quiet || config.output.quiet;

    println!("{}", "Loading post archives...".bold().cyan());
    println!("  Database: {}", db_path.display());
    println!();

    let mut storage = Storage::open(&db_path)?;
    let inputs = discover_inputs(&args.inputs)?;
    if inputs.is_empty() {
        anyhow::bail!("No loadable inputs found (expected .zip, .json, or .jsonl)");
    }

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );

    let mut totals = LoadStats::default();
    for input in &inputs {
        pb.set_message(format!("{}", input.path().display()));
        for_each_member(input, |member, reader| {
            let member_stats = load_lines(&mut storage, reader, |processed, post_id| {
                pb.tick();
                if processed % print_every == 0 {
                    info!("{member}: {processed} records, last id {post_id}");
                }
            })?;
            totals.inserted += member_stats.inserted;
            totals.skipped += member_stats.skipped;
            totals.failed += member_stats.failed;
            totals.malformed += member_stats.malformed;
            Ok(())
        })?;
        pb.println(format!("  {} {}", "✓".green(), input.path().display()));
    }
    pb.finish_and_clear();

    println!();
    println!("{}", "Load complete".bold().green());
    println!("  Inserted:  {}", totals.inserted);
    println!("  Skipped:   {}", totals.skipped);
    if totals.failed > 0 {
        println!("  {}    {}", "Failed:".red(), totals.failed);
        println!("  (failed records were rolled back and may be retried)");
    }
    if totals.malformed > 0 {
        println!("  Malformed: {}", totals.malformed);
    }

    Ok(())
}

fn cmd_completions(args: cli::CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
