//! CLI definitions for xload.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// xload - normalized loader for X/Twitter streaming archives
#[derive(Parser, Debug)]
#[command(name = "xload")]
#[command(version)]
#[command(about = "Load X/Twitter streaming archives into a normalized SQLite database")]
#[command(long_about = r#"
xload ingests zip archives of newline-delimited JSON post records and
loads them into a normalized relational schema (authors, posts, links,
tags, mentions, media).

Loads are idempotent: re-running the same input never creates
duplicates, and a record that fails partway leaves no partial rows.

Quick start:
  xload load batch-2025-01.zip --db posts.db
"#)]
pub struct Cli {
    /// Path to the database file
    #[arg(long, env = "XLOAD_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Be verbose (show debug info)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load archives of post records into the database
    Load(LoadArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Zip archives, .jsonl files, or directories of either
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Emit a progress line every N records
    #[arg(long)]
    pub print_every: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
