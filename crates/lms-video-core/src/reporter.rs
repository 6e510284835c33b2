//! Grade reporting to the LMS
//!
//! Receives the player's [`Outbound`](crate::player::Outbound) notifications:
//! grader resolutions and timeline snapshots for server-side persistence.

use crate::grading::GraderKind;
use anyhow::Context as _;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Sink for grading results
#[async_trait]
pub trait GradeReporter: Send + Sync {
    /// A grader's condition was met
    async fn report_grade(&self, video_id: &str, grader: GraderKind) -> anyhow::Result<()>;

    /// Persist a grader timeline as the server-side `graderState`
    async fn save_progress(&self, video_id: &str, grader: GraderKind, timeline: &[u8]) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
struct GradeBody<'a> {
    video_id: &'a str,
    grader: GraderKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressBody<'a> {
    video_id: &'a str,
    grader: GraderKind,
    grader_state: &'a [u8],
}

/// Posts JSON to the video block's handler endpoints
#[derive(Debug, Clone)]
pub struct HttpGradeReporter {
    client: reqwest::Client,
    grade_url: Url,
    progress_url: Url,
}

impl HttpGradeReporter {
    /// Endpoints are `<handler_base>/set_score` and `<handler_base>/save_user_state`
    pub fn new(handler_base: &Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            grade_url: handler_base.join("set_score").context("grade endpoint")?,
            progress_url: handler_base.join("save_user_state").context("progress endpoint")?,
        })
    }

    pub fn grade_url(&self) -> &Url {
        &self.grade_url
    }

    pub fn progress_url(&self) -> &Url {
        &self.progress_url
    }
}

#[async_trait]
impl GradeReporter for HttpGradeReporter {
    async fn report_grade(&self, video_id: &str, grader: GraderKind) -> anyhow::Result<()> {
        info!(video_id, %grader, "Reporting grade");

        self.client
            .post(self.grade_url.clone())
            .json(&GradeBody { video_id, grader })
            .send()
            .await
            .context("sending grade")?
            .error_for_status()
            .context("grade rejected")?;
        Ok(())
    }

    async fn save_progress(&self, video_id: &str, grader: GraderKind, timeline: &[u8]) -> anyhow::Result<()> {
        debug!(video_id, %grader, buckets = timeline.len(), "Saving grader state");

        self.client
            .post(self.progress_url.clone())
            .json(&ProgressBody { video_id, grader, grader_state: timeline })
            .send()
            .await
            .context("sending grader state")?
            .error_for_status()
            .context("grader state rejected")?;
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

#[async_trait]
impl GradeReporter for NoopReporter {
    async fn report_grade(&self, video_id: &str, grader: GraderKind) -> anyhow::Result<()> {
        debug!(video_id, %grader, "Grade dropped");
        Ok(())
    }

    async fn save_progress(&self, _video_id: &str, _grader: GraderKind, _timeline: &[u8]) -> anyhow::Result<()> {
        Ok(())
    }
}
