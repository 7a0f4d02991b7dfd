use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

use crate::args::Args;

pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let timer = LocalTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_writer(std::io::stderr)
        .init();
}

pub fn format_number(num: u32) -> String {
    let digits = num.to_string();
    digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn validate_args(args: &Args) -> anyhow::Result<()> {
    if args.draws == Some(0) {
        anyhow::bail!("--draws must be greater than 0");
    }

    if args.top == 0 {
        anyhow::bail!("--top must be greater than 0");
    }

    if let Some(bottom) = args.bottom {
        if bottom == 0 {
            anyhow::bail!("--bottom must be greater than 0");
        }
    }

    if args.concurrency == 0 {
        anyhow::bail!("--concurrency must be greater than 0");
    }

    if args.date_cap == 0 {
        anyhow::bail!("--date-cap must be greater than 0");
    }

    if let Some(workers) = args.workers {
        if workers == 0 {
            anyhow::bail!("--workers must be greater than 0");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn groups_thousands() {
        assert_eq!(format_number(7), "7");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn rejects_zero_limits() {
        let parse = |extra: &[&str]| {
            let mut argv = vec!["drawstat", "--source-dir", "d"];
            argv.extend_from_slice(extra);
            Args::parse_from(argv)
        };
        assert!(validate_args(&parse(&[])).is_ok());
        assert!(validate_args(&parse(&["--draws", "0"])).is_err());
        assert!(validate_args(&parse(&["--concurrency", "0"])).is_err());
        assert!(validate_args(&parse(&["--workers", "0"])).is_err());
        assert!(validate_args(&parse(&["--years", "0"])).is_ok());
    }

    #[test]
    fn source_is_required_and_windows_are_exclusive() {
        assert!(Args::try_parse_from(["drawstat"]).is_err());
        assert!(Args::try_parse_from(["drawstat", "--source-dir", "d", "--years", "1", "--months", "2"]).is_err());
        assert!(Args::try_parse_from(["drawstat", "--source-dir", "d", "--export-csv", "out.csv"]).is_err());
    }
}
