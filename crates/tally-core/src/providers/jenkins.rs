use super::{read_json, trim_base, CiServer};
use crate::model::{BuildInfo, TestReport};
use async_trait::async_trait;

const SERVICE: &str = "Jenkins";

pub struct JenkinsClient {
    base: String,
    user: String,
    password: String,
    client: reqwest::Client,
}

impl JenkinsClient {
    pub fn new(base_url: &str, user: String, password: String, client: reqwest::Client) -> Self {
        Self {
            base: trim_base(base_url),
            user,
            password,
            client,
        }
    }

    fn job_url(&self, job: &str) -> String {
        format!("{}/{}", self.base, job_path(job))
    }

    async fn get(&self, url: &str) -> anyhow::Result<reqwest::Response> {
        tracing::debug!(event = "jenkins_get", url = %url);
        Ok(self
            .client
            .get(url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?)
    }
}

/// `folder/job` -> `job/folder/job/job`.
pub(crate) fn job_path(job: &str) -> String {
    job.split('/')
        .filter(|p| !p.is_empty())
        .map(|p| format!("job/{}", p))
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl CiServer for JenkinsClient {
    async fn latest_build_number(&self, job: &str) -> anyhow::Result<u32> {
        let url = format!(
            "{}/api/json?tree=lastCompletedBuild[number]",
            self.job_url(job)
        );
        let json = read_json(SERVICE, self.get(&url).await?).await?;
        parse_last_completed(&json)
            .ok_or_else(|| anyhow::anyhow!("job {} has no completed builds", job))
    }

    async fn build_info(&self, job: &str, number: u32) -> anyhow::Result<BuildInfo> {
        let url = format!(
            "{}/{}/api/json?tree=number,timestamp,description,displayName",
            self.job_url(job),
            number
        );
        let json = read_json(SERVICE, self.get(&url).await?).await?;
        Ok(serde_json::from_value(json)?)
    }

    async fn build_test_report(
        &self,
        job: &str,
        number: u32,
    ) -> anyhow::Result<Option<TestReport>> {
        let url = format!("{}/{}/testReport/api/json", self.job_url(job), number);
        let resp = self.get(&url).await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let json = read_json(SERVICE, resp).await?;
        Ok(Some(serde_json::from_value(json)?))
    }
}

pub(crate) fn parse_last_completed(json: &serde_json::Value) -> Option<u32> {
    json.pointer("/lastCompletedBuild/number")
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok())
}
