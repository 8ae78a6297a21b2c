//! Progress extraction from unstructured download-tool output.
//!
//! The external tool prints free-form lines containing percentages and,
//! for grouped (multi-file) transfers, `index/total` markers. The
//! [`ProgressTracker`] turns those lines into a monotonic, rate-limited
//! percentage that is handed to a [`ProgressSink`].

mod config;
mod parse;
mod tracker;
mod types;

pub use config::ProgressConfig;
pub use parse::{parse_group_marker, parse_percent};
pub use tracker::ProgressTracker;
pub use types::{GroupMarker, ProgressSink, ProgressSinkError, ProgressUpdate};
