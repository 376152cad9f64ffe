//! Output generation for run results.
//!
//! # Submodules
//!
//! - [`report`]: Serializes the [`RunReport`](crate::pipeline::RunReport) to a
//!   JSON log line and, optionally, a JSON file

pub mod report;
