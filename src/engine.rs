use crate::config::{TailOptions, TargetSet};
use crate::error::{Error, Result};
use crate::stats::Stats;
use crate::tailer::FileProcessor;
use md5::{Digest, Md5};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Bumped whenever the checkpoint format changes incompatibly.
const POS_FILE_TAG: &str = "axslog-v4";

/// Samples collected for one log file.
#[derive(Debug)]
pub struct TargetStats {
    pub log_file: PathBuf,
    pub stats: Stats,
}

/// Handed back from a concurrent target run.
#[derive(Debug)]
struct ProcessResult {
    index: usize,
    log_file: PathBuf,
    result: Result<Stats>,
}

pub struct Engine {
    targets: TargetSet,
    processor: FileProcessor,
}

impl Engine {
    pub fn new(targets: TargetSet, options: TailOptions) -> Self {
        Self {
            targets,
            processor: FileProcessor::new(options),
        }
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    /// Processes every configured log file and returns their stats in
    /// configured order. A failing target is logged and left out, unless
    /// every target failed.
    pub fn run(&self) -> Result<Vec<TargetStats>> {
        let log_files = &self.targets.log_files;
        if log_files.is_empty() {
            return Err(Error::NoTargets);
        }
        fs::create_dir_all(&self.targets.work_dir)
            .map_err(|e| Error::io("create work dir", &self.targets.work_dir, e))?;

        let start = Instant::now();
        let results = if let [log_file] = log_files.as_slice() {
            let pos_file = self.pos_file(None);
            let stats = self.processor.get_file_stats(&pos_file, log_file)?;
            vec![TargetStats {
                log_file: log_file.clone(),
                stats,
            }]
        } else {
            self.run_concurrent(log_files)?
        };

        debug!(
            targets = log_files.len(),
            succeeded = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run finished"
        );
        Ok(results)
    }

    fn run_concurrent(&self, log_files: &[PathBuf]) -> Result<Vec<TargetStats>> {
        let (tx, rx) = mpsc::sync_channel::<ProcessResult>(log_files.len());

        rayon::scope(|s| {
            for (index, log_file) in log_files.iter().enumerate() {
                let tx = tx.clone();
                let pos_file = self.pos_file(Some(log_file));
                s.spawn(move |_| {
                    let result = self.processor.get_file_stats(&pos_file, log_file);
                    // capacity equals the target count, so this never blocks
                    let _ = tx.send(ProcessResult {
                        index,
                        log_file: log_file.clone(),
                        result,
                    });
                });
            }
        });
        drop(tx);

        let mut succeeded: Vec<(usize, TargetStats)> = Vec::with_capacity(log_files.len());
        let mut failed = 0;
        let mut last_error = None;
        for ProcessResult {
            index,
            log_file,
            result,
        } in rx
        {
            match result {
                Ok(stats) => succeeded.push((index, TargetStats { log_file, stats })),
                Err(err) => {
                    failed += 1;
                    warn!(path = %log_file.display(), error = %err, "get stats failed");
                    last_error = Some((log_file, err));
                }
            }
        }

        if succeeded.is_empty() {
            if let Some((log_file, err)) = last_error {
                return Err(Error::AllTargetsFailed {
                    count: failed,
                    target: log_file.display().to_string(),
                    source: Box::new(err),
                });
            }
        }

        succeeded.sort_by_key(|(index, _)| *index);
        Ok(succeeded.into_iter().map(|(_, stats)| stats).collect())
    }

    /// Checkpoint path for a target. `log_file` is only set when several
    /// targets share the key prefix.
    pub fn pos_file(&self, log_file: Option<&Path>) -> PathBuf {
        pos_file_path(
            &self.targets.work_dir,
            &self.targets.owner,
            &self.targets.key_prefix,
            log_file,
        )
    }
}

pub fn pos_file_path(
    work_dir: &Path,
    owner: &str,
    key_prefix: &str,
    log_file: Option<&Path>,
) -> PathBuf {
    let name = match log_file {
        None => format!("{}-{}-{}", owner, POS_FILE_TAG, key_prefix),
        Some(log_file) => {
            let digest = Md5::digest(log_file.to_string_lossy().as_bytes());
            format!("{}-{}-{}-{:x}", owner, POS_FILE_TAG, key_prefix, digest)
        }
    };
    work_dir.join(name)
}

/// Writes the metric lines of every target, in order.
pub fn emit<W: Write>(results: &mut [TargetStats], key_prefix: &str, out: &mut W) -> io::Result<()> {
    for target in results.iter_mut() {
        info!(
            path = %target.log_file.display(),
            samples = target.stats.total(),
            "emitting stats"
        );
        target.stats.display(key_prefix, out)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_target_pos_file_name() {
        let path = pos_file_path(Path::new("/tmp/work"), "1000", "nginx", None);
        assert_eq!(path, PathBuf::from("/tmp/work/1000-axslog-v4-nginx"));
    }

    #[test]
    fn test_multi_target_pos_file_name() {
        let path = pos_file_path(
            Path::new("/tmp/work"),
            "1000",
            "nginx",
            Some(Path::new("/var/log/nginx/access.log")),
        );
        let digest = format!("{:x}", Md5::digest(b"/var/log/nginx/access.log"));
        assert_eq!(digest.len(), 32);
        assert_eq!(
            path,
            PathBuf::from(format!("/tmp/work/1000-axslog-v4-nginx-{}", digest))
        );
    }

    #[test]
    fn test_multi_target_pos_files_do_not_collide() {
        let work = Path::new("/tmp/work");
        let a = pos_file_path(work, "0", "web", Some(Path::new("/var/log/a.log")));
        let b = pos_file_path(work, "0", "web", Some(Path::new("/var/log/b.log")));
        assert_ne!(a, b);
        assert_eq!(a, pos_file_path(work, "0", "web", Some(Path::new("/var/log/a.log"))));
    }

    #[test]
    fn test_md5_of_known_value() {
        assert_eq!(
            format!("{:x}", Md5::digest(b"")),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }
}
