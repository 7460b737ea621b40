use super::{read_json, TestRepository};
use crate::model::TestCaseRecord;
use async_trait::async_trait;

const SERVICE: &str = "TestRail";

pub struct TestRailClient {
    api_base: String,
    user: String,
    password: String,
    client: reqwest::Client,
}

impl TestRailClient {
    pub fn new(base_url: &str, user: String, password: String, client: reqwest::Client) -> Self {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            api_base: format!("{}index.php?/api/v2/", base),
            user,
            password,
            client,
        }
    }

    async fn send_get(&self, uri: &str) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}{}", self.api_base, uri);
        tracing::debug!(event = "testrail_get", url = %url);
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Content-Type", "application/json")
            .send()
            .await?;
        read_json(SERVICE, resp).await
    }
}

#[async_trait]
impl TestRepository for TestRailClient {
    async fn list_cases(
        &self,
        project_id: u64,
        suite_id: u64,
    ) -> anyhow::Result<Vec<TestCaseRecord>> {
        let mut uri = format!("get_cases/{}&suite_id={}", project_id, suite_id);
        let mut cases = Vec::new();
        loop {
            let page = parse_cases_page(self.send_get(&uri).await?)?;
            cases.extend(page.cases);
            match page.next {
                Some(next) => uri = next,
                None => break,
            }
        }
        tracing::debug!(
            event = "testrail_cases",
            project_id,
            suite_id,
            count = cases.len()
        );
        Ok(cases)
    }
}

#[derive(Debug)]
pub(crate) struct CasesPage {
    pub cases: Vec<TestCaseRecord>,
    /// API method for the next page, relative to `index.php?/api/v2/`.
    pub next: Option<String>,
}

/// Older TestRail versions return a bare array; newer ones wrap the cases in
/// a paginated envelope with `_links.next`.
pub(crate) fn parse_cases_page(json: serde_json::Value) -> anyhow::Result<CasesPage> {
    match json {
        serde_json::Value::Array(_) => Ok(CasesPage {
            cases: serde_json::from_value(json)?,
            next: None,
        }),
        serde_json::Value::Object(mut obj) => {
            let cases = match obj.remove("cases") {
                Some(v) => serde_json::from_value(v)?,
                None => anyhow::bail!("TestRail response has no 'cases' field"),
            };
            let next = obj
                .get("_links")
                .and_then(|l| l.get("next"))
                .and_then(|n| n.as_str())
                .map(|n| n.trim_start_matches('/').trim_start_matches("api/v2/").to_string());
            Ok(CasesPage { cases, next })
        }
        other => anyhow::bail!("unexpected TestRail response: {}", other),
    }
}
