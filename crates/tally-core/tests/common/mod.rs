#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeZone};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tally_core::config::{JobConfig, ReconcileConfig};
use tally_core::model::{
    BuildInfo, CreatedIssue, IssueFields, IssueSummary, ReportCase, ReportSuite, TestCaseRecord,
    TestReport,
};
use tally_core::providers::{CiServer, IssueTracker, TestRepository};

#[derive(Default)]
pub struct FakeCi {
    pub latest: Mutex<u32>,
    pub builds: Mutex<BTreeMap<u32, (BuildInfo, TestReport)>>,
    pub report_calls: Mutex<Vec<u32>>,
}

impl FakeCi {
    pub fn new(latest: u32) -> Self {
        let ci = Self::default();
        *ci.latest.lock().unwrap() = latest;
        ci
    }

    pub fn add_build(&self, number: u32, display_name: &str, report: TestReport) {
        let info = BuildInfo {
            number,
            timestamp: millis_on(2024, 5, 1),
            description: Some("R2.3".into()),
            display_name: display_name.into(),
        };
        self.builds.lock().unwrap().insert(number, (info, report));
    }

    pub fn set_latest(&self, latest: u32) {
        *self.latest.lock().unwrap() = latest;
    }
}

#[async_trait]
impl CiServer for FakeCi {
    async fn latest_build_number(&self, _job: &str) -> anyhow::Result<u32> {
        Ok(*self.latest.lock().unwrap())
    }

    async fn build_info(&self, job: &str, number: u32) -> anyhow::Result<BuildInfo> {
        self.builds
            .lock()
            .unwrap()
            .get(&number)
            .map(|(info, _)| info.clone())
            .ok_or_else(|| anyhow::anyhow!("{} #{} not found", job, number))
    }

    async fn build_test_report(&self, _job: &str, number: u32) -> anyhow::Result<Option<TestReport>> {
        self.report_calls.lock().unwrap().push(number);
        Ok(self
            .builds
            .lock()
            .unwrap()
            .get(&number)
            .map(|(_, report)| report.clone()))
    }
}

#[derive(Default)]
pub struct FakeTracker {
    pub issues: BTreeMap<String, IssueSummary>,
    pub search_results: Vec<IssueSummary>,
    /// Creation fails for summaries containing any of these.
    pub reject_summaries: Vec<String>,
    pub fail_epics: bool,
    pub created: Mutex<Vec<IssueFields>>,
    pub epics: Mutex<Vec<(String, Vec<String>)>>,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeTracker {
    pub fn with_issue(mut self, key: &str, status: &str) -> Self {
        self.issues.insert(
            key.to_string(),
            IssueSummary {
                key: key.into(),
                summary: String::new(),
                status: Some(status.into()),
            },
        );
        self
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn create_issue(&self, fields: &IssueFields) -> anyhow::Result<CreatedIssue> {
        if self
            .reject_summaries
            .iter()
            .any(|s| fields.summary.contains(s.as_str()))
        {
            anyhow::bail!("Jira API returned HTTP 400 (field 'summary' rejected)");
        }
        let mut created = self.created.lock().unwrap();
        created.push(fields.clone());
        Ok(CreatedIssue {
            key: format!("ATOM-{}", 9000 + created.len()),
        })
    }

    async fn search_issues(&self, _jql: &str) -> anyhow::Result<Vec<IssueSummary>> {
        Ok(self.search_results.clone())
    }

    async fn get_issue(&self, key: &str) -> anyhow::Result<IssueSummary> {
        self.lookups.lock().unwrap().push(key.to_string());
        self.issues
            .get(&key.to_uppercase())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Jira API returned HTTP 404 ({})", key))
    }

    async fn add_issues_to_epic(&self, epic_key: &str, issue_keys: &[String]) -> anyhow::Result<()> {
        if self.fail_epics {
            anyhow::bail!("Jira agile API returned HTTP 500 (epic locked)");
        }
        self.epics
            .lock()
            .unwrap()
            .push((epic_key.to_string(), issue_keys.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRepo {
    pub suites: BTreeMap<u64, Vec<TestCaseRecord>>,
    pub failing_suites: Vec<u64>,
}

#[async_trait]
impl TestRepository for FakeRepo {
    async fn list_cases(&self, _project_id: u64, suite_id: u64) -> anyhow::Result<Vec<TestCaseRecord>> {
        if self.failing_suites.contains(&suite_id) {
            anyhow::bail!("TestRail API returned HTTP 500 (suite {})", suite_id);
        }
        Ok(self.suites.get(&suite_id).cloned().unwrap_or_default())
    }
}

pub fn millis_on(y: i32, m: u32, d: u32) -> i64 {
    let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
    Local
        .from_local_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
        .unwrap()
        .timestamp_millis()
}

pub fn seconds_on(date: NaiveDate) -> i64 {
    Local
        .from_local_datetime(&date.and_hms_opt(9, 15, 0).unwrap())
        .unwrap()
        .timestamp()
}

/// `(name, status, error_details)` triples in one suite.
pub fn report(pass: u64, fail: u64, skip: u64, cases: &[(&str, &str, Option<&str>)]) -> TestReport {
    TestReport {
        pass_count: pass,
        fail_count: fail,
        skip_count: skip,
        suites: vec![ReportSuite {
            name: Some("smoke".into()),
            cases: cases
                .iter()
                .map(|(name, status, err)| ReportCase {
                    name: name.to_string(),
                    class_name: "tests.smoke".into(),
                    status: status.to_string(),
                    error_details: err.map(str::to_string),
                })
                .collect(),
        }],
    }
}

/// One job with a low validity threshold so small reports count.
pub fn settings() -> ReconcileConfig {
    ReconcileConfig {
        jobs: vec![JobConfig::new("Daily_CI_DAE", 0.8, 2, "daecaseinfo", "daebuildinfo")],
        bug_query: "project = atom".into(),
        ..ReconcileConfig::default()
    }
}

pub const FKP1: &str = "#101 DAE nightly on fkp1 rack7";
pub const FKP2: &str = "#101 DAE nightly on fkp2 rack9";
