use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Largest backlog a single run will read from one file.
pub const DEFAULT_MAX_READ_SIZE: u64 = 1000 * 1000 * 1000;
/// Largest record kept in memory; longer records are skipped.
pub const DEFAULT_MAX_RECORD_SIZE: usize = 1024 * 1024;

pub const DEFAULT_PRIMARY_KEY: &str = "request_time";
pub const DEFAULT_SECONDARY_KEY: &str = "upstream_response_time";

/// Environment variable the monitoring agent uses to hand plugins a state dir.
const PLUGIN_WORKDIR_ENV: &str = "MACKEREL_PLUGIN_WORKDIR";

/// Settings read from `axslog.toml` and `AXSLOG_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub work_dir: Option<PathBuf>,
    pub max_read_size: u64,
    pub max_record_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_dir: None,
            max_read_size: DEFAULT_MAX_READ_SIZE,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Settings, ConfigError> {
        let builder = Config::builder()
            .set_default("max_read_size", DEFAULT_MAX_READ_SIZE as i64)?
            .set_default("max_record_size", DEFAULT_MAX_RECORD_SIZE as i64)?
            .add_source(ConfigFile::with_name("axslog").required(false))
            .add_source(Environment::with_prefix("AXSLOG").try_parsing(true))
            .build()?;
        builder.try_deserialize::<Settings>()
    }

    /// State directory: explicit override, then the configured `work_dir`,
    /// then the agent-provided plugin dir, then the OS temp dir.
    pub fn resolve_work_dir(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| self.work_dir.clone())
            .or_else(|| env::var_os(PLUGIN_WORKDIR_ENV).map(PathBuf::from))
            .unwrap_or_else(env::temp_dir)
    }
}

/// How records are read and interpreted for every target of a run.
#[derive(Debug, Clone)]
pub struct TailOptions {
    pub primary_key: String,
    pub secondary_key: String,
    /// Records not containing this text are ignored. Empty disables filtering.
    pub filter: String,
    pub max_read_size: u64,
    pub max_record_size: usize,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            secondary_key: DEFAULT_SECONDARY_KEY.to_string(),
            filter: String::new(),
            max_read_size: DEFAULT_MAX_READ_SIZE,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl TailOptions {
    pub fn with_limits(mut self, settings: &Settings) -> Self {
        self.max_read_size = settings.max_read_size;
        self.max_record_size = settings.max_record_size;
        self
    }
}

/// The log files of one invocation together with where their state lives.
#[derive(Debug, Clone)]
pub struct TargetSet {
    pub log_files: Vec<PathBuf>,
    pub key_prefix: String,
    pub work_dir: PathBuf,
    /// Namespaces checkpoint files per invoking user.
    pub owner: String,
}

/// Splits a comma separated `--logfile` value verbatim.
///
/// Entries are neither trimmed nor dropped: the entry count decides the
/// checkpoint naming scheme, so `a.log,` stays two targets (the empty one
/// fails on its own) and keeps the per-file checkpoint names.
pub fn split_log_files(value: &str) -> Vec<PathBuf> {
    value.split(',').map(PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_files() {
        let files = split_log_files("/var/log/a.log,/var/log/b.log");
        assert_eq!(
            files,
            vec![PathBuf::from("/var/log/a.log"), PathBuf::from("/var/log/b.log")]
        );
    }

    #[test]
    fn test_split_log_files_keeps_every_entry() {
        let files = split_log_files("/var/log/a.log,");
        assert_eq!(files, vec![PathBuf::from("/var/log/a.log"), PathBuf::new()]);
        assert_eq!(split_log_files("/var/log/a.log"), vec![PathBuf::from("/var/log/a.log")]);
        assert_eq!(split_log_files(""), vec![PathBuf::new()]);
    }

    #[test]
    fn test_resolve_work_dir_prefers_explicit() {
        let settings = Settings {
            work_dir: Some(PathBuf::from("/from/settings")),
            ..Settings::default()
        };
        assert_eq!(
            settings.resolve_work_dir(Some(PathBuf::from("/from/flag"))),
            PathBuf::from("/from/flag")
        );
        assert_eq!(settings.resolve_work_dir(None), PathBuf::from("/from/settings"));
    }

    #[test]
    fn test_tail_options_with_limits() {
        let settings = Settings {
            max_read_size: 10,
            max_record_size: 20,
            ..Settings::default()
        };
        let options = TailOptions::default().with_limits(&settings);
        assert_eq!(options.max_read_size, 10);
        assert_eq!(options.max_record_size, 20);
        assert_eq!(options.primary_key, DEFAULT_PRIMARY_KEY);
        assert_eq!(options.secondary_key, DEFAULT_SECONDARY_KEY);
    }
}
