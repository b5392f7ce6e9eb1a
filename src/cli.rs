use axslog::config::{DEFAULT_PRIMARY_KEY, DEFAULT_SECONDARY_KEY};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "axslog")]
#[command(
    about = "Latency percentiles from LTSV access logs",
    long_about = "Latency percentiles from LTSV access logs.\n\n\
Each run reads the records appended since the previous run and prints the \
average and the 90th, 95th and 99th percentile of request time minus upstream \
time. Rotation is detected through the file's inode and device (the file index \
on Windows). On platforms without either, identity falls back to the file's path \
and creation time: a rotated file is then not found under its new name, and \
records written to it after the previous run are not counted."
)]
pub struct Cli {
    /// Path to nginx ltsv logfiles. Multiple log files can be specified, separated by commas.
    #[arg(long = "logfile")]
    pub log_file: String,

    /// Metric key prefix
    #[arg(long)]
    pub key_prefix: String,

    /// Key name for request_time
    #[arg(long = "request-time-key", default_value = DEFAULT_PRIMARY_KEY)]
    pub request_time: String,

    /// Key name for upstream_response_time
    #[arg(long = "upstream-time-key", default_value = DEFAULT_SECONDARY_KEY)]
    pub upstream_time: String,

    /// Text for filtering log
    #[arg(long, default_value = "")]
    pub filter: String,

    /// Directory for position files
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_long_help_describes_identity_fallback() {
        let cmd = Cli::command();
        cmd.clone().debug_assert();
        let long_about = cmd.get_long_about().unwrap().to_string();
        assert!(long_about.contains("creation time"));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["axslog", "--logfile", "a.log,b.log", "--key-prefix", "web"]);
        assert_eq!(cli.log_file, "a.log,b.log");
        assert_eq!(cli.request_time, DEFAULT_PRIMARY_KEY);
        assert_eq!(cli.upstream_time, DEFAULT_SECONDARY_KEY);
        assert_eq!(cli.filter, "");
        assert!(cli.work_dir.is_none());
    }
}
