use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub mod credentials;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TallyConfig {
    #[serde(rename = "configVersion", alias = "version")]
    pub version: u32,
    pub testrail: TestRailSettings,
    pub sync: SyncConfig,
    pub reconcile: ReconcileConfig,
    pub http: HttpSettings,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            testrail: TestRailSettings::default(),
            sync: SyncConfig::default(),
            reconcile: ReconcileConfig::default(),
            http: HttpSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TestRailSettings {
    pub project_id: u64,
}

impl Default for TestRailSettings {
    fn default() -> Self {
        Self { project_id: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub suites: Vec<SuiteConfig>,
    pub issue: IssueTemplate,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            suites: vec![
                SuiteConfig::new(2, None),
                SuiteConfig::new(9, None),
                SuiteConfig::new(13, None),
                SuiteConfig::new(1477, Some("ATOM-4496")),
                SuiteConfig::new(1478, Some("ATOM-4581")),
            ],
            issue: IssueTemplate::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteConfig {
    pub id: u64,
    /// Epic that newly filed issues from this suite are attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic: Option<String>,
}

impl SuiteConfig {
    pub fn new(id: u64, epic: Option<&str>) -> Self {
        Self {
            id,
            epic: epic.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IssueTemplate {
    pub project_key: String,
    pub issue_type: String,
    pub components: Vec<String>,
    pub fallback_description: String,
    pub extra_fields: BTreeMap<String, serde_json::Value>,
}

impl Default for IssueTemplate {
    fn default() -> Self {
        let mut extra_fields = BTreeMap::new();
        extra_fields.insert("customfield_10006".to_string(), serde_json::json!(2));
        Self {
            project_key: "ATOM".into(),
            issue_type: "Test Case Script".into(),
            components: vec!["DAE script".into()],
            fallback_description: "test case script".into(),
            extra_fields,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconcileConfig {
    pub workbook: PathBuf,
    /// Stop counting a case's history after this many completed runs.
    pub run_limit: usize,
    pub miss_build_window: u32,
    /// How far back to start when a job has no recorded builds yet.
    pub initial_lookback: u32,
    pub excluded_hardware: Vec<String>,
    pub known_issue_prefix: String,
    pub ticket_prefix: String,
    pub bug_query: String,
    pub jobs: Vec<JobConfig>,
    pub backlog: BacklogConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from("case_analysis_result.xlsx"),
            run_limit: 1024,
            miss_build_window: 6,
            initial_lookback: 10,
            excluded_hardware: vec!["fkp2".into()],
            known_issue_prefix: "JIRAFICS".into(),
            ticket_prefix: "ATOM".into(),
            bug_query: "project = atom and Status != completed and issueType = bug and summary ~ 'CI bug fix'".into(),
            jobs: vec![
                JobConfig::new("Daily_CI_DAE", 0.8, 100, "daecaseinfo", "daebuildinfo"),
                JobConfig::new(
                    "Daily_CI_Redfish",
                    0.6,
                    30,
                    "redfishcaseinfo",
                    "redfishbuildinfo",
                ),
                JobConfig::new(
                    "Weekly_Stress_DAE",
                    0.3,
                    6,
                    "daestresscase",
                    "daestressbuild",
                ),
            ],
            backlog: BacklogConfig::default(),
        }
    }
}

impl ReconcileConfig {
    pub fn job(&self, name: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// Applies command-line overrides. `only_job` narrows the run to one
    /// configured job; `min_cases` then applies to the remaining jobs.
    pub fn apply_overrides(
        &mut self,
        run_limit: Option<usize>,
        min_cases: Option<usize>,
        only_job: Option<&str>,
    ) -> Result<(), ConfigError> {
        if let Some(n) = run_limit {
            self.run_limit = n;
        }
        if let Some(name) = only_job {
            if self.job(name).is_none() {
                let known: Vec<_> = self.jobs.iter().map(|j| j.name.as_str()).collect();
                return Err(ConfigError(format!(
                    "unknown job '{}' (configured: {})",
                    name,
                    known.join(", ")
                )));
            }
            self.jobs.retain(|j| j.name == name);
        }
        if let Some(n) = min_cases {
            for job in &mut self.jobs {
                job.min_cases = n;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    pub name: String,
    /// Builds whose `(pass+skip)/total` falls below this are not recorded.
    pub min_pass_rate: f64,
    /// A report must contain more cases than this to count as complete.
    pub min_cases: usize,
    pub case_sheet: String,
    pub build_sheet: String,
}

impl JobConfig {
    pub fn new(
        name: &str,
        min_pass_rate: f64,
        min_cases: usize,
        case_sheet: &str,
        build_sheet: &str,
    ) -> Self {
        Self {
            name: name.into(),
            min_pass_rate,
            min_cases,
            case_sheet: case_sheet.into(),
            build_sheet: build_sheet.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacklogConfig {
    pub sheet: String,
    pub groups: Vec<BacklogGroup>,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            sheet: "Backlog Case Number".into(),
            groups: vec![
                BacklogGroup {
                    name: "DAE".into(),
                    suites: vec![1478, 1477],
                    platforms: vec![20, 21, 22],
                    eol: 0,
                },
                BacklogGroup {
                    name: "DPE".into(),
                    suites: vec![2, 9],
                    platforms: vec![12, 15, 18, 19, 13, 17],
                    eol: 0,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacklogGroup {
    pub name: String,
    pub suites: Vec<u64>,
    pub platforms: Vec<i64>,
    /// Cases retired as end-of-life, counted as automated.
    #[serde(default)]
    pub eol: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_seconds: u64,
    pub insecure_tls: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            insecure_tls: true,
        }
    }
}

pub fn load_config(path: &Path) -> Result<TallyConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    parse_config(&raw, path)
}

/// Loads `path` when it exists, otherwise the built-in defaults.
pub fn load_config_or_default(path: &Path) -> Result<TallyConfig, ConfigError> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(event = "config_defaults", path = %path.display());
        Ok(TallyConfig::default())
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<TallyConfig, ConfigError> {
    let mut ignored_keys = HashSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);
    let cfg: TallyConfig = serde_ignored::deserialize(deserializer, |p| {
        ignored_keys.insert(p.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML {}: {}", path.display(), e)))?;

    if !ignored_keys.is_empty() {
        let mut keys: Vec<_> = ignored_keys.into_iter().collect();
        keys.sort();
        tracing::warn!(
            event = "config_unknown_fields",
            path = %path.display(),
            fields = ?keys,
            "ignored unknown config fields"
        );
    }

    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &TallyConfig) -> Result<(), ConfigError> {
    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    let mut seen = HashSet::new();
    for job in &cfg.reconcile.jobs {
        if !seen.insert(job.name.as_str()) {
            return Err(ConfigError(format!("duplicate job '{}'", job.name)));
        }
        if !(0.0..=1.0).contains(&job.min_pass_rate) {
            return Err(ConfigError(format!(
                "job '{}': min_pass_rate {} is outside 0..=1",
                job.name, job.min_pass_rate
            )));
        }
    }
    if cfg.reconcile.known_issue_prefix.trim().is_empty() {
        return Err(ConfigError("reconcile.known_issue_prefix is empty".into()));
    }
    Ok(())
}
