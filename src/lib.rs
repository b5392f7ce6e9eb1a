pub mod config;
pub mod engine;
pub mod error;
pub mod ltsv;
pub mod platform;
pub mod position;
pub mod stats;
pub mod tailer;

pub use config::{Settings, TailOptions, TargetSet};
pub use engine::{Engine, TargetStats};
pub use error::{Error, Result};
pub use stats::Stats;
