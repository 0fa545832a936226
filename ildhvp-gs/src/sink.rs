//! Remote gradebook sink
//!
//! Posts results to another server's `setgrade` web service. Every request
//! names the learner through `userid`; the configured token belongs to a
//! service account holding the save-for-others capability on the remote
//! server. Both servers must share user ids.

use async_trait::async_trait;
use ildhvp_common::progress::SectionProgress;
use ildhvp_common::sink::ResultSink;
use ildhvp_common::{Error, PersistCommand, Result};
use std::time::Duration;
use tracing::debug;

use crate::api::{SetGradeRequest, SetGradeResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpResultSink {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpResultSink {
    /// `base_url` is the remote server root, e.g. `https://lms.example/ildhvp`
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/webservice/setgrade", base_url.trim_end_matches('/')),
            token: token.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ResultSink for HttpResultSink {
    async fn set_result(&self, user_id: i64, command: PersistCommand) -> Result<SectionProgress> {
        debug!(user_id, content_id = command.content_id, "Posting result to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&SetGradeRequest {
                contentid: command.content_id,
                score: command.score,
                maxscore: command.max_score,
                userid: Some(user_id),
            })
            .send()
            .await
            .map_err(|e| Error::Internal(format!("setgrade request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Internal(format!(
                "setgrade returned {}: {}",
                status, body
            )));
        }

        let body: SetGradeResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Invalid setgrade response: {}", e)))?;

        Ok(SectionProgress {
            section_id: body.sectionid,
            percentage: body.percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let sink = HttpResultSink::new("https://lms.example/ildhvp/", "t").unwrap();
        assert_eq!(sink.endpoint(), "https://lms.example/ildhvp/webservice/setgrade");
    }
}
