use super::{ensure_success, read_json, trim_base, IssueTracker};
use crate::model::{CreatedIssue, IssueFields, IssueSummary};
use async_trait::async_trait;
use serde_json::json;

const SERVICE: &str = "Jira";
const PAGE_SIZE: u64 = 100;

pub struct JiraClient {
    base: String,
    agile_base: String,
    user: String,
    password: String,
    client: reqwest::Client,
}

impl JiraClient {
    /// `agile_url` hosts the epic API; it defaults to `base_url`.
    pub fn new(
        base_url: &str,
        agile_url: Option<&str>,
        user: String,
        password: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base: trim_base(base_url),
            agile_base: trim_base(agile_url.unwrap_or(base_url)),
            user,
            password,
            client,
        }
    }

    /// Browse link for an issue key.
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base, key)
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn create_issue(&self, fields: &IssueFields) -> anyhow::Result<CreatedIssue> {
        let url = format!("{}/rest/api/2/issue", self.base);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&json!({ "fields": fields.to_json() }))
            .send()
            .await?;
        let body = read_json(SERVICE, resp).await?;
        let key = body
            .get("key")
            .and_then(|k| k.as_str())
            .ok_or_else(|| anyhow::anyhow!("Jira create response missing 'key'"))?;
        Ok(CreatedIssue {
            key: key.to_string(),
        })
    }

    async fn search_issues(&self, jql: &str) -> anyhow::Result<Vec<IssueSummary>> {
        let url = format!("{}/rest/api/2/search", self.base);
        let mut issues = Vec::new();
        let mut start_at = 0u64;
        loop {
            let resp = self
                .client
                .get(&url)
                .basic_auth(&self.user, Some(&self.password))
                .query(&[
                    ("jql", jql.to_string()),
                    ("startAt", start_at.to_string()),
                    ("maxResults", PAGE_SIZE.to_string()),
                    ("fields", "summary,status".to_string()),
                ])
                .send()
                .await?;
            let page = parse_search_page(&read_json(SERVICE, resp).await?)?;
            let fetched = page.issues.len() as u64;
            issues.extend(page.issues);
            start_at += fetched;
            if fetched == 0 || start_at >= page.total {
                break;
            }
        }
        Ok(issues)
    }

    async fn get_issue(&self, key: &str) -> anyhow::Result<IssueSummary> {
        let url = format!("{}/rest/api/2/issue/{}", self.base, key);
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.password))
            .query(&[("fields", "summary,status")])
            .send()
            .await?;
        parse_issue(&read_json(SERVICE, resp).await?)
    }

    async fn add_issues_to_epic(
        &self,
        epic_key: &str,
        issue_keys: &[String],
    ) -> anyhow::Result<()> {
        let url = format!("{}/rest/agile/1.0/epic/{}/issue", self.agile_base, epic_key);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&json!({ "issues": issue_keys }))
            .send()
            .await?;
        ensure_success(SERVICE, resp).await?;
        Ok(())
    }
}

pub(crate) struct SearchPage {
    pub issues: Vec<IssueSummary>,
    pub total: u64,
}

pub(crate) fn parse_search_page(json: &serde_json::Value) -> anyhow::Result<SearchPage> {
    let issues = json
        .get("issues")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow::anyhow!("Jira search response missing 'issues'"))?
        .iter()
        .map(parse_issue)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let total = json
        .get("total")
        .and_then(|v| v.as_u64())
        .unwrap_or(issues.len() as u64);
    Ok(SearchPage { issues, total })
}

pub(crate) fn parse_issue(json: &serde_json::Value) -> anyhow::Result<IssueSummary> {
    let key = json
        .get("key")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Jira issue missing 'key'"))?;
    let fields = json.get("fields");
    let summary = fields
        .and_then(|f| f.pointer("/summary"))
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let status = fields
        .and_then(|f| f.pointer("/status/name"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Ok(IssueSummary {
        key: key.to_string(),
        summary: summary.to_string(),
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agile_url_defaults_to_base() {
        let c = JiraClient::new(
            "https://jira.example.com/",
            None,
            "u".into(),
            "p".into(),
            reqwest::Client::new(),
        );
        assert_eq!(c.agile_base, "https://jira.example.com");
        assert_eq!(
            c.browse_url("ATOM-1"),
            "https://jira.example.com/browse/ATOM-1"
        );
    }

    #[test]
    fn test_parse_issue_with_status() {
        let issue = parse_issue(&json!({
            "key": "JIRAFICS-4821",
            "fields": {"summary": "fan speed", "status": {"name": "Closed"}}
        }))
        .unwrap();
        assert_eq!(issue.key, "JIRAFICS-4821");
        assert_eq!(issue.status.as_deref(), Some("Closed"));
    }

    #[test]
    fn test_parse_search_page() {
        let page = parse_search_page(&json!({
            "startAt": 0,
            "maxResults": 100,
            "total": 2,
            "issues": [
                {"key": "ATOM-10", "fields": {"summary": "CI bug fix C1234 flaky boot"}},
                {"key": "ATOM-11", "fields": {"summary": "CI bug fix C5678"}}
            ]
        }))
        .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.issues[1].summary, "CI bug fix C5678");
        assert!(page.issues[0].status.is_none());
    }

    #[test]
    fn test_issue_without_key_is_error() {
        assert!(parse_issue(&json!({"fields": {}})).is_err());
    }
}
