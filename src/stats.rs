use chrono::Utc;
use std::io::{self, Write};

/// Percentiles reported after the average, in output order.
const PERCENTILES: [(&str, f64); 3] = [
    ("99_percentile", 0.99),
    ("95_percentile", 0.95),
    ("90_percentile", 0.90),
];

/// Latency samples collected for one target during one run.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    samples: Vec<f64>,
    sum: f64,
    duration: f64,
    sorted: bool,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, sample: f64) {
        self.samples.push(sample);
        self.sum += sample;
        self.sorted = false;
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration;
    }

    /// Seconds between the previous checkpoint and this run's checkpoint.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn total(&self) -> usize {
        self.samples.len()
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.sum / self.samples.len() as f64)
    }

    /// Nearest-rank percentile: index `round(n * p) - 1` over the sorted
    /// samples, rounding half away from zero.
    pub fn percentile(&mut self, p: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        self.sort();
        let index = percentile_index(self.samples.len(), p);
        self.samples.get(index).copied()
    }

    fn sort(&mut self) {
        if !self.sorted {
            self.samples.sort_by(f64::total_cmp);
            self.sorted = true;
        }
    }

    /// Writes the average and the 99/95/90 percentiles as
    /// `key<TAB>value<TAB>unix_timestamp` lines. Writes nothing without samples.
    pub fn display<W: Write>(&mut self, key_prefix: &str, out: &mut W) -> io::Result<()> {
        let Some(average) = self.average() else {
            return Ok(());
        };
        let now = Utc::now().timestamp();

        writeln!(out, "{}\t{:.6}\t{}", metric_key(key_prefix, "average"), average, now)?;
        for (name, p) in PERCENTILES {
            if let Some(value) = self.percentile(p) {
                writeln!(out, "{}\t{:.6}\t{}", metric_key(key_prefix, name), value, now)?;
            }
        }
        Ok(())
    }
}

pub fn metric_key(key_prefix: &str, name: &str) -> String {
    format!("axslog.latency_{}.{}", key_prefix, name)
}

fn percentile_index(n: usize, p: f64) -> usize {
    ((n as f64 * p).round() as usize).saturating_sub(1)
}
