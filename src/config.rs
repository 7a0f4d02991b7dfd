use std::env;
use std::path::PathBuf;

use crate::args::Args;
use crate::select::{Selection, SelectionPolicy};

pub const DEFAULT_CONCURRENCY: usize = 6;
pub const DEFAULT_RECENT_DRAWS: usize = 24;
pub const DEFAULT_DATE_CAP: usize = 10;
pub const MAX_PARSE_WORKERS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Retrievals in flight at once.
    pub concurrency: usize,
    /// Pending candidates fetched before the backfill phase.
    pub recent_draws: usize,
    /// Extra attempts for transient fetch failures.
    pub retries: u32,
    pub date_cap: usize,
    /// Threads used for parsing and merging.
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            recent_draws: DEFAULT_RECENT_DRAWS,
            retries: 0,
            date_cap: DEFAULT_DATE_CAP,
            workers: default_workers(),
        }
    }
}

impl From<&Args> for PipelineConfig {
    fn from(args: &Args) -> Self {
        Self {
            concurrency: args.concurrency,
            recent_draws: args.recent,
            retries: args.retries,
            date_cap: args.date_cap,
            workers: args.workers.unwrap_or_else(default_workers),
        }
    }
}

pub fn default_workers() -> usize {
    std::cmp::min(num_cpus::get(), MAX_PARSE_WORKERS)
}

pub fn selection_from_args(args: &Args) -> Selection {
    let policy = match (args.draws, args.years, args.months) {
        (Some(n), _, _) => SelectionPolicy::RecentDraws(n),
        (_, Some(n), _) => SelectionPolicy::Years(n),
        (_, _, Some(n)) => SelectionPolicy::Months(n),
        _ => SelectionPolicy::All,
    };
    Selection::new(policy, args.anchored)
}

/// Cache file location, defaulting to the home directory.
pub fn cache_path(args: &Args) -> PathBuf {
    args.cache.clone().unwrap_or_else(|| {
        PathBuf::from(&format!(
            "{}/.drawstat_cache.db",
            env::var("HOME").unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_default())
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn args_map_to_config_and_selection() {
        let args = Args::parse_from([
            "drawstat", "--source-dir", "draws", "--months", "6", "--anchored", "--concurrency", "2", "--workers", "3",
        ]);
        let config = PipelineConfig::from(&args);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.workers, 3);
        assert_eq!(config.recent_draws, DEFAULT_RECENT_DRAWS);
        assert_eq!(selection_from_args(&args), Selection::new(SelectionPolicy::Months(6), true));
    }

    #[test]
    fn no_window_selects_everything() {
        let args = Args::parse_from(["drawstat", "--source-url", "https://example.org/draws/"]);
        assert_eq!(selection_from_args(&args), Selection::default());
    }

    #[test]
    fn explicit_cache_path_wins() {
        let args = Args::parse_from(["drawstat", "--source-dir", "d", "--cache", "/tmp/x.db"]);
        assert_eq!(cache_path(&args), PathBuf::from("/tmp/x.db"));
    }
}
