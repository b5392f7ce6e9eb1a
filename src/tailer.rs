use crate::config::TailOptions;
use crate::error::{Error, Result};
use crate::ltsv::{parse_f64, LtsvParser, RecordParser};
use crate::platform::{self, FileIdentity};
use crate::position;
use crate::stats::Stats;
use memchr::memchr;
use memchr::memmem::Finder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

const READ_BUF_SIZE: usize = 64 * 1024;

/// Drives one log target from its checkpoint to end of file.
pub struct FileProcessor {
    parser: LtsvParser,
    /// Built once from `options.filter`; `None` when filtering is off.
    filter: Option<Finder<'static>>,
    options: TailOptions,
}

/// What one pass over a file did.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ScanSummary {
    pub start_offset: i64,
    pub end_offset: i64,
    pub rows: usize,
    pub skipped: usize,
}

impl FileProcessor {
    pub fn new(options: TailOptions) -> Self {
        Self {
            parser: LtsvParser::new(&options.primary_key, &options.secondary_key),
            filter: (!options.filter.is_empty())
                .then(|| Finder::new(options.filter.as_bytes()).into_owned()),
            options,
        }
    }

    /// Collects samples for `log_file` since the checkpoint in `pos_file` and
    /// moves the checkpoint to the end of what was read.
    ///
    /// On rotation the new file is read from the start, then the predecessor
    /// is looked up by identity in the same directory and drained from the
    /// old offset without touching the checkpoint.
    pub fn get_file_stats(&self, pos_file: &Path, log_file: &Path) -> Result<Stats> {
        let mut stats = Stats::new();

        let previous = if position::exists(pos_file) {
            position::read(pos_file)?
        } else {
            position::Checkpoint::default()
        };
        let last_identity = previous.identity();

        let identity = platform::file_identity(log_file)?;
        let end_time = if !identity.is_rotated_from(&last_identity) {
            let (_, end_time) =
                self.parse_file(log_file, previous.offset, Some(pos_file), &mut stats)?;
            end_time
        } else {
            info!(
                path = %log_file.display(),
                previous_inode = last_identity.inode,
                current_inode = identity.inode,
                "detected rotation"
            );
            let (_, end_time) = self.parse_file(log_file, 0, Some(pos_file), &mut stats)?;
            self.drain_predecessor(log_file, &last_identity, previous.offset, &mut stats);
            end_time
        };

        if let Some(end_time) = end_time {
            stats.set_duration(end_time - previous.timestamp);
        }
        debug!(
            path = %log_file.display(),
            samples = stats.total(),
            duration = stats.duration(),
            "collected samples"
        );
        Ok(stats)
    }

    fn drain_predecessor(
        &self,
        log_file: &Path,
        last_identity: &FileIdentity,
        last_pos: i64,
        stats: &mut Stats,
    ) {
        let dir = match log_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        match platform::search_file_by_identity(dir, last_identity) {
            Ok(previous_file) => {
                if let Err(err) = self.parse_file(&previous_file, last_pos, None, stats) {
                    warn!(path = %previous_file.display(), error = %err, "could not parse previous file");
                }
            }
            Err(err) => {
                warn!(path = %log_file.display(), error = %err, "could not search previous file");
            }
        }
    }

    /// Reads `log_file` from `last_pos` to EOF. When `pos_file` is given the
    /// final offset is checkpointed and the checkpoint timestamp returned.
    pub fn parse_file(
        &self,
        log_file: &Path,
        last_pos: i64,
        pos_file: Option<&Path>,
        stats: &mut Stats,
    ) -> Result<(ScanSummary, Option<f64>)> {
        let mut file = File::open(log_file).map_err(|e| Error::io("open", log_file, e))?;
        let metadata = file.metadata().map_err(|e| Error::io("stat", log_file, e))?;
        let identity = platform::identity_from_metadata(log_file, &metadata)?;
        let size = i64::try_from(metadata.len()).unwrap_or(i64::MAX);

        info!(path = %log_file.display(), last_pos, size, "analysis start");

        let max_read_size = i64::try_from(self.options.max_read_size).unwrap_or(i64::MAX);
        let mut start = last_pos;
        if size.saturating_sub(start) > max_read_size {
            warn!(
                path = %log_file.display(),
                last_pos,
                size,
                "backlog exceeds read limit; skipping to end of file"
            );
            start = size;
        }
        if start > size {
            warn!(path = %log_file.display(), last_pos, size, "file is smaller than checkpoint");
        }

        let seek_to = u64::try_from(start).map_err(|_| {
            Error::io(
                "seek",
                log_file,
                io::Error::new(io::ErrorKind::InvalidInput, "negative offset"),
            )
        })?;
        file.seek(SeekFrom::Start(seek_to))
            .map_err(|e| Error::io("seek", log_file, e))?;

        let mut reader = RecordReader::new(
            BufReader::with_capacity(READ_BUF_SIZE, file),
            start,
            self.options.max_record_size,
        );
        let summary = self
            .scan(&mut reader, stats)
            .map_err(|e| Error::io("read", log_file, e))?;

        info!(
            path = %log_file.display(),
            start_pos = summary.start_offset,
            end_pos = summary.end_offset,
            rows = summary.rows,
            skipped = summary.skipped,
            "analysis completed"
        );

        let end_time = match pos_file {
            Some(pos_file) => Some(position::write(pos_file, summary.end_offset, &identity)?),
            None => None,
        };
        Ok((summary, end_time))
    }

    /// Filters, parses and accumulates every record until EOF.
    pub fn scan<R: BufRead>(
        &self,
        reader: &mut RecordReader<R>,
        stats: &mut Stats,
    ) -> io::Result<ScanSummary> {
        let mut summary = ScanSummary {
            start_offset: reader.position(),
            ..ScanSummary::default()
        };

        loop {
            match reader.read_next()? {
                Next::Eof => break,
                Next::Oversized(len) => {
                    warn!(len, offset = reader.position(), "record exceeds size limit; skipped");
                    summary.skipped += 1;
                    continue;
                }
                Next::Record => {}
            }

            let record = reader.record();
            if let Some(filter) = &self.filter {
                if filter.find(record).is_none() {
                    continue;
                }
            }

            let fields = self.parser.parse(record);
            let Some(primary) = fields.primary else {
                debug!(offset = reader.position(), "record has no primary field; skipped");
                summary.skipped += 1;
                continue;
            };
            let (Some(primary_time), Some(secondary_time)) =
                (parse_f64(primary), parse_f64(fields.secondary))
            else {
                warn!(
                    primary = %String::from_utf8_lossy(primary),
                    secondary = %String::from_utf8_lossy(fields.secondary),
                    "failed to convert ptime; skipped"
                );
                summary.skipped += 1;
                continue;
            };

            stats.append(primary_time - secondary_time);
            summary.rows += 1;
        }

        summary.end_offset = reader.position();
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Record,
    /// A record longer than the limit was consumed and dropped.
    Oversized(usize),
    Eof,
}

/// Newline framed record reader that tracks the byte offset consumed and
/// never buffers more than `max_record_size` bytes of one record.
pub struct RecordReader<R> {
    inner: R,
    pos: i64,
    max_record_size: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R, pos: i64, max_record_size: usize) -> Self {
        Self {
            inner,
            pos,
            max_record_size,
            buf: Vec::new(),
        }
    }

    /// Offset just past the last byte consumed.
    pub fn position(&self) -> i64 {
        self.pos
    }

    /// The record produced by the last `Next::Record`, without its line ending.
    pub fn record(&self) -> &[u8] {
        &self.buf
    }

    pub fn read_next(&mut self) -> io::Result<Next> {
        self.buf.clear();
        let mut consumed_any = false;
        let mut oversized: Option<usize> = None;

        loop {
            let available = self.inner.fill_buf()?;
            if available.is_empty() {
                if !consumed_any {
                    return Ok(Next::Eof);
                }
                break;
            }
            consumed_any = true;

            let (used, done) = match memchr(b'\n', available) {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            };
            let content = if done {
                &available[..used - 1]
            } else {
                &available[..used]
            };

            match oversized.as_mut() {
                Some(len) => *len += content.len(),
                None if self.buf.len() + content.len() > self.max_record_size => {
                    oversized = Some(self.buf.len() + content.len());
                    self.buf.clear();
                }
                None => self.buf.extend_from_slice(content),
            }

            self.inner.consume(used);
            self.pos += used as i64;
            if done {
                break;
            }
        }

        if let Some(len) = oversized {
            return Ok(Next::Oversized(len));
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Next::Record)
    }
}
