use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::category::Category;
use crate::config::{DEFAULT_CONCURRENCY, DEFAULT_DATE_CAP, DEFAULT_RECENT_DRAWS};

#[derive(Parser, Debug)]
#[command(
    name = "drawstat",
    about = "Aggregate published lottery draw files into frequency tables",
    version,
    long_about = None
)]
#[command(group(ArgGroup::new("source").required(true).args(["source_url", "source_dir"])))]
#[command(group(ArgGroup::new("window").args(["draws", "years", "months"])))]
pub struct Args {
    /// Base URL the dated draw files are served under
    #[arg(long)]
    pub source_url: Option<String>,

    /// Local directory holding dated draw files
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Limit to the N most recent draws
    #[arg(short, long)]
    pub draws: Option<usize>,

    /// Limit to a window of N years (0 for no limit)
    #[arg(short, long)]
    pub years: Option<u32>,

    /// Limit to a window of N months (0 for no limit)
    #[arg(short, long)]
    pub months: Option<u32>,

    /// Measure the window from the first archived draw instead of today
    #[arg(short, long)]
    pub anchored: bool,

    /// Number of most frequent values to display per category
    #[arg(short, long, default_value_t = 10)]
    pub top: usize,

    /// Number of least frequent values to display per category
    #[arg(long)]
    pub bottom: Option<usize>,

    /// Only report these categories
    #[arg(short, long, value_delimiter = ',')]
    pub category: Vec<Category>,

    /// Number of most recent draws to list
    #[arg(long, default_value_t = 5)]
    pub recent_display: usize,

    /// Print the merged tables as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Write every value of --export-category as value,date lines to this file
    #[arg(long, requires = "export_category")]
    pub export_csv: Option<PathBuf>,

    /// Category exported by --export-csv
    #[arg(long, requires = "export_csv")]
    pub export_category: Option<Category>,

    /// Maximum concurrent retrievals
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Draws fetched before the rest of the archive
    #[arg(long, default_value_t = DEFAULT_RECENT_DRAWS)]
    pub recent: usize,

    /// Retries for transient network failures
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Maximum contributing dates recorded per value
    #[arg(long, default_value_t = DEFAULT_DATE_CAP)]
    pub date_cap: usize,

    /// Number of worker threads for parsing
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Path of the snapshot cache database
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Do not read or write the snapshot cache
    #[arg(long)]
    pub no_cache: bool,

    /// Discard the cached snapshot and fetch everything again
    #[arg(long, conflicts_with = "no_cache")]
    pub refresh: bool,

    /// Print the tables after the recent phase as well as at the end
    #[arg(long)]
    pub progressive: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
