use chrono::{Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Result of one case in one build, as stored in the case table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CaseStatus {
    Passed,
    Failed,
    Blocked,
    Skipped,
    NotAvailable,
    Other(String),
}

impl CaseStatus {
    /// Parses a CI or workbook status. `REGRESSION` and `FIXED` collapse to
    /// `FAILED` and `PASSED`; blanks are `N/A`; unknown values pass through.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "PASSED" | "FIXED" => CaseStatus::Passed,
            "FAILED" | "REGRESSION" => CaseStatus::Failed,
            "BLOCKED" => CaseStatus::Blocked,
            "SKIPPED" => CaseStatus::Skipped,
            "" | "N/A" => CaseStatus::NotAvailable,
            other => CaseStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CaseStatus::Passed => "PASSED",
            CaseStatus::Failed => "FAILED",
            CaseStatus::Blocked => "BLOCKED",
            CaseStatus::Skipped => "SKIPPED",
            CaseStatus::NotAvailable => "N/A",
            CaseStatus::Other(s) => s,
        }
    }

    /// Counts as a completed run for pass-rate purposes.
    pub fn is_run(&self) -> bool {
        matches!(
            self,
            CaseStatus::Passed | CaseStatus::Failed | CaseStatus::Blocked
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CaseStatus::Failed | CaseStatus::Blocked)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a case sheet: a case id and its result per build number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseRow {
    pub case_id: String,
    pub results: BTreeMap<u32, CaseStatus>,
    /// `Known Issue` cell as last written, if any.
    pub known_issue: Option<String>,
}

impl CaseRow {
    pub fn new(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            results: BTreeMap::new(),
            known_issue: None,
        }
    }

    pub fn status(&self, build: u32) -> &CaseStatus {
        self.results
            .get(&build)
            .unwrap_or(&CaseStatus::NotAvailable)
    }

    /// Results ordered newest build first.
    pub fn newest_first(&self) -> impl Iterator<Item = &CaseStatus> {
        self.results.values().rev()
    }
}

/// One accepted CI build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildRow {
    pub build: u32,
    pub date: String,
    pub release: String,
    pub enclosure: String,
    pub rack: String,
    pub pass: u64,
    pub fail: u64,
    pub skip: u64,
    pub passrate: String,
}

/// Tri-state "automatable" custom field of a repository case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Automatable {
    Unknown = 1,
    No = 2,
    Yes = 3,
}

impl Automatable {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Automatable::Unknown),
            2 => Some(Automatable::No),
            3 => Some(Automatable::Yes),
            _ => None,
        }
    }
}

/// "Needs physical access" custom field: 1 = yes, 2 = no.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalAccess {
    Required = 1,
    NotRequired = 2,
}

impl PhysicalAccess {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(PhysicalAccess::Required),
            2 => Some(PhysicalAccess::NotRequired),
            _ => None,
        }
    }
}

/// A test case as returned by the test repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestCaseRecord {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_on: i64,
    #[serde(default, rename = "custom_preconds")]
    pub preconditions: Option<String>,
    #[serde(default, rename = "custom_ffv_automatable")]
    pub automatable: Option<i64>,
    #[serde(default, rename = "custom_ffvplatform")]
    pub platforms: Option<Vec<i64>>,
    #[serde(default, rename = "custom_ffv_cpu_specific")]
    pub tags: Option<Vec<i64>>,
    #[serde(default, rename = "custom_ffv_need_physical_access")]
    pub physical_access: Option<i64>,
}

impl TestCaseRecord {
    pub fn automatable(&self) -> Option<Automatable> {
        self.automatable.and_then(Automatable::from_code)
    }

    pub fn physical_access(&self) -> Option<PhysicalAccess> {
        self.physical_access.and_then(PhysicalAccess::from_code)
    }

    /// Creation date in the local timezone.
    pub fn created_date(&self) -> Option<NaiveDate> {
        Local
            .timestamp_opt(self.created_on, 0)
            .single()
            .map(|dt| dt.date_naive())
    }

    pub fn platforms(&self) -> &[i64] {
        self.platforms.as_deref().unwrap_or(&[])
    }
}

/// Fields of an issue to be created in the tracker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueFields {
    pub project_key: String,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub components: Vec<String>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl IssueFields {
    /// Renders the tracker's `fields` object.
    pub fn to_json(&self) -> serde_json::Value {
        let mut fields = serde_json::Map::new();
        fields.insert(
            "project".into(),
            serde_json::json!({ "key": self.project_key }),
        );
        fields.insert("summary".into(), self.summary.clone().into());
        fields.insert("description".into(), self.description.clone().into());
        fields.insert(
            "issuetype".into(),
            serde_json::json!({ "name": self.issue_type }),
        );
        if !self.components.is_empty() {
            let components: Vec<_> = self
                .components
                .iter()
                .map(|c| serde_json::json!({ "name": c }))
                .collect();
            fields.insert("components".into(), components.into());
        }
        for (k, v) in &self.extra {
            fields.insert(k.clone(), v.clone());
        }
        serde_json::Value::Object(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueSummary {
    pub key: String,
    pub summary: String,
    pub status: Option<String>,
}

/// Metadata of one CI build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub number: u32,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: String,
}

impl BuildInfo {
    pub fn build_date(&self) -> Option<NaiveDate> {
        Local
            .timestamp_millis_opt(self.timestamp)
            .single()
            .map(|dt| dt.date_naive())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    #[serde(default)]
    pub pass_count: u64,
    #[serde(default)]
    pub fail_count: u64,
    #[serde(default)]
    pub skip_count: u64,
    #[serde(default)]
    pub suites: Vec<ReportSuite>,
}

impl TestReport {
    pub fn cases(&self) -> impl Iterator<Item = &ReportCase> {
        self.suites.iter().flat_map(|s| s.cases.iter())
    }

    pub fn case_count(&self) -> usize {
        self.suites.iter().map(|s| s.cases.len()).sum()
    }

    /// `(pass + skip) / (pass + fail + skip)`, zero for an empty report.
    pub fn pass_rate(&self) -> f64 {
        let total = self.pass_count + self.fail_count + self.skip_count;
        if total == 0 {
            return 0.0;
        }
        (self.pass_count + self.skip_count) as f64 / total as f64
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSuite {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cases: Vec<ReportCase>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCase {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error_details: Option<String>,
}

/// Formats a ratio as a percentage with two decimals, e.g. `0.6 -> "60.00%"`.
pub fn format_rate(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}
