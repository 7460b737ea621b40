use crate::config::HttpSettings;
use crate::errors::ApiError;
use crate::model::{
    BuildInfo, CreatedIssue, IssueFields, IssueSummary, TestCaseRecord, TestReport,
};
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

pub mod jenkins;
pub mod jira;
pub mod testrail;

/// Test-case repository (TestRail).
#[async_trait]
pub trait TestRepository: Send + Sync {
    async fn list_cases(&self, project_id: u64, suite_id: u64)
        -> anyhow::Result<Vec<TestCaseRecord>>;
}

/// Issue tracker (Jira core + agile API).
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(&self, fields: &IssueFields) -> anyhow::Result<CreatedIssue>;
    async fn search_issues(&self, jql: &str) -> anyhow::Result<Vec<IssueSummary>>;
    async fn get_issue(&self, key: &str) -> anyhow::Result<IssueSummary>;
    async fn add_issues_to_epic(&self, epic_key: &str, issue_keys: &[String])
        -> anyhow::Result<()>;
}

/// Continuous-integration server (Jenkins).
#[async_trait]
pub trait CiServer: Send + Sync {
    async fn latest_build_number(&self, job: &str) -> anyhow::Result<u32>;
    async fn build_info(&self, job: &str, number: u32) -> anyhow::Result<BuildInfo>;
    /// `None` when the build has no test report (yet).
    async fn build_test_report(&self, job: &str, number: u32)
        -> anyhow::Result<Option<TestReport>>;
}

pub fn build_http_client(settings: &HttpSettings) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_seconds))
        .danger_accept_invalid_certs(settings.insecure_tls)
        .build()
        .context("failed to build HTTP client")
}

/// Turns a non-success response into an [`ApiError`] carrying the body.
pub(crate) async fn ensure_success(
    service: &'static str,
    resp: reqwest::Response,
) -> anyhow::Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError {
        service,
        status: status.as_u16(),
        body,
    }
    .into())
}

pub(crate) async fn read_json(
    service: &'static str,
    resp: reqwest::Response,
) -> anyhow::Result<serde_json::Value> {
    let resp = ensure_success(service, resp).await?;
    resp.json()
        .await
        .with_context(|| format!("{} API returned invalid JSON", service))
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
