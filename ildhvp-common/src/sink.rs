//! Persist-result collaborator
//!
//! The aggregator only decides *what* to persist. Implementations of
//! [`ResultSink`] write it to a gradebook and report the resulting section
//! progress.

use async_trait::async_trait;

use crate::aggregator::PersistCommand;
use crate::progress::SectionProgress;
use crate::Result;

/// Destination for results produced by the aggregator
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store a result for `user_id` and return the updated section progress
    ///
    /// Failures are reported to the caller, who logs them; no retry is expected.
    async fn set_result(&self, user_id: i64, command: PersistCommand) -> Result<SectionProgress>;
}
