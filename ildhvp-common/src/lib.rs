//! # ILDHVP Common Library
//!
//! Shared code for the H5P scoring bridge:
//! - Content model and library identifier parsing
//! - Content-tree scoring analysis
//! - xAPI statement parsing and per-instance score aggregation
//! - Section progress calculation
//! - Gradebook database schema and queries
//! - Configuration loading
//! - iframe resize handshake

pub mod aggregator;
pub mod analysis;
pub mod config;
pub mod content;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod progress;
pub mod resize;
pub mod sink;
pub mod sse;
pub mod xapi;

pub use aggregator::{Classification, ContentInstanceState, PersistCommand};
pub use analysis::{analyze, AnalysisResult, CompletionTrigger};
pub use content::{ContentNode, ContentType, LibraryName};
pub use error::{Error, Result};
pub use xapi::Statement;
