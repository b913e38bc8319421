//! Wire protocol handling for the sensor node's line-oriented telemetry
//!
//! The node emits one newline-terminated record per system tick, shared
//! with its boot banner and diagnostic prints on the same line. This module
//! turns that raw byte stream into typed [`Sample`](crate::types::Sample)s:
//!
//! - [`LineFramer`] - Splits arbitrarily chunked text into complete lines,
//!   retaining any partial trailing line across reads
//! - [`parse_record`] - Matches one line against the known record layouts
//!   and extracts a sample, or rejects the line
//!
//! Parsing is deliberately permissive at the line level: anything that is
//! not a recognized record (banners, "Learning Baseline..." progress,
//! corrupted fragments) is dropped without raising an error.

pub mod framer;
pub mod parser;

pub use framer::LineFramer;
pub use parser::parse_record;
