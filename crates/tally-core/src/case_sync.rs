use crate::config::{IssueTemplate, SuiteConfig, SyncConfig};
use crate::model::{Automatable, IssueFields, TestCaseRecord};
use crate::providers::{IssueTracker, TestRepository};
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCase {
    pub suite_id: u64,
    pub case_id: u64,
    /// Tracker key, or `None` in a dry run.
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub suite_id: u64,
    /// `None` when the suite listing itself failed.
    pub case_id: Option<u64>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub date: NaiveDate,
    pub dry_run: bool,
    pub matched: usize,
    pub created: Vec<CreatedCase>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn new(date: NaiveDate, dry_run: bool) -> Self {
        Self {
            date,
            dry_run,
            matched: 0,
            created: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Cases created on `date` (local time) and marked automatable.
pub fn select_new_automatable(cases: &[TestCaseRecord], date: NaiveDate) -> Vec<&TestCaseRecord> {
    cases
        .iter()
        .filter(|c| c.created_date() == Some(date) && c.automatable() == Some(Automatable::Yes))
        .collect()
}

pub fn issue_fields_for(case: &TestCaseRecord, template: &IssueTemplate) -> IssueFields {
    let description = case
        .preconditions
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(template.fallback_description.as_str());
    IssueFields {
        project_key: template.project_key.clone(),
        summary: format!("[{}]-{}", case.id, case.title),
        description: description.to_string(),
        issue_type: template.issue_type.clone(),
        components: template.components.clone(),
        extra: template.extra_fields.clone(),
    }
}

/// Files a tracker issue for every newly created automatable repository case.
pub struct CaseSync<'a> {
    repo: &'a dyn TestRepository,
    tracker: &'a dyn IssueTracker,
    settings: &'a SyncConfig,
    project_id: u64,
    dry_run: bool,
}

impl<'a> CaseSync<'a> {
    pub fn new(
        repo: &'a dyn TestRepository,
        tracker: &'a dyn IssueTracker,
        settings: &'a SyncConfig,
        project_id: u64,
    ) -> Self {
        Self {
            repo,
            tracker,
            settings,
            project_id,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Never fails as a whole: per-suite and per-case errors land in the report.
    pub async fn run(&self, date: NaiveDate) -> SyncReport {
        let mut report = SyncReport::new(date, self.dry_run);
        for suite in &self.settings.suites {
            self.sync_suite(suite, date, &mut report).await;
        }
        tracing::info!(
            event = "sync_finished",
            date = %date,
            matched = report.matched,
            created = report.created.len(),
            failures = report.failures.len(),
            dry_run = self.dry_run
        );
        report
    }

    async fn sync_suite(&self, suite: &SuiteConfig, date: NaiveDate, report: &mut SyncReport) {
        let cases = match self.repo.list_cases(self.project_id, suite.id).await {
            Ok(cases) => cases,
            Err(e) => {
                tracing::error!(
                    event = "suite_listing_failed",
                    suite_id = suite.id,
                    error = %e,
                    "failed to list suite cases"
                );
                report.failures.push(SyncFailure {
                    suite_id: suite.id,
                    case_id: None,
                    error: format!("{:#}", e),
                });
                return;
            }
        };

        let selected = select_new_automatable(&cases, date);
        tracing::debug!(
            event = "suite_listed",
            suite_id = suite.id,
            cases = cases.len(),
            selected = selected.len()
        );
        report.matched += selected.len();

        for case in selected {
            let fields = issue_fields_for(case, &self.settings.issue);
            if self.dry_run {
                tracing::info!(
                    event = "issue_dry_run",
                    suite_id = suite.id,
                    case_id = case.id,
                    summary = %fields.summary,
                    epic = ?suite.epic
                );
                report.created.push(CreatedCase {
                    suite_id: suite.id,
                    case_id: case.id,
                    key: None,
                });
                continue;
            }
            self.create_issue(suite, case.id, &fields, date, report).await;
        }
    }

    async fn create_issue(
        &self,
        suite: &SuiteConfig,
        case_id: u64,
        fields: &IssueFields,
        date: NaiveDate,
        report: &mut SyncReport,
    ) {
        let created = match self.tracker.create_issue(fields).await {
            Ok(issue) => issue,
            Err(e) => {
                tracing::error!(
                    event = "issue_create_failed",
                    case_id,
                    date = %date,
                    error = %e,
                    "failed to create issue"
                );
                report.failures.push(SyncFailure {
                    suite_id: suite.id,
                    case_id: Some(case_id),
                    error: format!("{:#}", e),
                });
                return;
            }
        };
        tracing::info!(event = "issue_created", case_id, key = %created.key);
        report.created.push(CreatedCase {
            suite_id: suite.id,
            case_id,
            key: Some(created.key.clone()),
        });

        let Some(epic) = suite.epic.as_deref() else {
            return;
        };
        if let Err(e) = self
            .tracker
            .add_issues_to_epic(epic, std::slice::from_ref(&created.key))
            .await
        {
            tracing::error!(
                event = "epic_attach_failed",
                case_id,
                date = %date,
                key = %created.key,
                epic = %epic,
                error = %e,
                "failed to attach issue to epic"
            );
            report.failures.push(SyncFailure {
                suite_id: suite.id,
                case_id: Some(case_id),
                error: format!("{:#}", e),
            });
        }
    }
}
