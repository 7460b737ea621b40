use super::context::ReconcileContext;
use super::table::JobTables;
use crate::case_id::extract_case_id;
use crate::config::{JobConfig, ReconcileConfig};
use crate::model::{format_rate, BuildInfo, BuildRow, CaseStatus, TestReport};
use crate::providers::{CiServer, IssueTracker};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// No report yet, or too few cases for the report to be complete.
    NotAvailable { cases: usize },
    LowPassRate { rate: f64 },
    ExcludedHardware { enclosure: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotAvailable { cases } => write!(f, "not available ({} cases)", cases),
            SkipReason::LowPassRate { rate } => {
                write!(f, "pass rate {} below threshold", format_rate(*rate))
            }
            SkipReason::ExcludedHardware { enclosure } => {
                write!(f, "excluded hardware {}", enclosure)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Accepted {
        build: u32,
        pass_rate: String,
        new_cases: usize,
    },
    Skipped {
        build: u32,
        reason: SkipReason,
    },
}

impl BuildOutcome {
    pub fn build(&self) -> u32 {
        match self {
            BuildOutcome::Accepted { build, .. } | BuildOutcome::Skipped { build, .. } => *build,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, BuildOutcome::Accepted { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobReport {
    pub job: String,
    pub latest: Option<u32>,
    pub outcomes: Vec<BuildOutcome>,
}

impl JobReport {
    pub fn accepted(&self) -> impl Iterator<Item = &BuildOutcome> {
        self.outcomes.iter().filter(|o| o.is_accepted())
    }
}

/// Enclosure and rack labels: whitespace tokens 4 and 5 of the build's
/// display name, e.g. `"#101 DAE nightly on fkp1 rack7"`.
pub fn parse_location(display_name: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = display_name.split(' ').collect();
    match (tokens.get(4), tokens.get(5)) {
        (Some(enclosure), Some(rack)) => Some((enclosure.to_string(), rack.to_string())),
        _ => None,
    }
}

/// Pulls CI results for tracked jobs into their tables.
pub struct Reconciler<'a> {
    ci: &'a dyn CiServer,
    tracker: &'a dyn IssueTracker,
    settings: &'a ReconcileConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        ci: &'a dyn CiServer,
        tracker: &'a dyn IssueTracker,
        settings: &'a ReconcileConfig,
    ) -> Self {
        Self {
            ci,
            tracker,
            settings,
        }
    }

    /// Catches up with the CI server, then backfills recently missed builds.
    pub async fn run_job(
        &self,
        job: &JobConfig,
        tables: &mut JobTables,
        ctx: &mut ReconcileContext,
    ) -> anyhow::Result<JobReport> {
        let before = crate::fingerprint::table_fingerprint(tables);
        let (latest, mut outcomes) = self.catch_up(job, tables, ctx).await?;
        outcomes.extend(self.check_missed_builds(job, tables, ctx).await?);
        let after = crate::fingerprint::table_fingerprint(tables);

        tracing::info!(
            event = "job_reconciled",
            job = %job.name,
            latest,
            accepted = outcomes.iter().filter(|o| o.is_accepted()).count(),
            skipped = outcomes.iter().filter(|o| !o.is_accepted()).count(),
            changed = before != after,
            fingerprint = %after
        );

        Ok(JobReport {
            job: job.name.clone(),
            latest: Some(latest),
            outcomes,
        })
    }

    /// Processes every build after the newest recorded one up to the latest
    /// completed build on the server.
    pub async fn catch_up(
        &self,
        job: &JobConfig,
        tables: &mut JobTables,
        ctx: &mut ReconcileContext,
    ) -> anyhow::Result<(u32, Vec<BuildOutcome>)> {
        let latest = self.ci.latest_build_number(&job.name).await?;
        let last_known = tables
            .newest_build()
            .unwrap_or_else(|| latest.saturating_sub(self.settings.initial_lookback));

        tracing::info!(event = "catch_up", job = %job.name, latest, last_known);
        if latest <= last_known {
            return Ok((latest, Vec::new()));
        }
        let outcomes = self
            .reconcile_builds(job, (last_known + 1)..=latest, tables, ctx)
            .await?;
        Ok((latest, outcomes))
    }

    /// Re-checks the builds just before the newest recorded one that are
    /// still missing, e.g. because their report was incomplete last time.
    pub async fn check_missed_builds(
        &self,
        job: &JobConfig,
        tables: &mut JobTables,
        ctx: &mut ReconcileContext,
    ) -> anyhow::Result<Vec<BuildOutcome>> {
        let Some(newest) = tables.newest_build() else {
            return Ok(Vec::new());
        };
        let start = newest.saturating_sub(self.settings.miss_build_window);
        let missing: Vec<u32> = (start..newest)
            .filter(|b| *b > 0 && !tables.has_build(*b))
            .collect();
        if !missing.is_empty() {
            tracing::info!(event = "miss_build_check", job = %job.name, builds = ?missing);
        }
        self.reconcile_builds(job, missing, tables, ctx).await
    }

    /// Evaluates each build in order and records the accepted ones.
    pub async fn reconcile_builds<I>(
        &self,
        job: &JobConfig,
        builds: I,
        tables: &mut JobTables,
        ctx: &mut ReconcileContext,
    ) -> anyhow::Result<Vec<BuildOutcome>>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut outcomes = Vec::new();
        for build in builds {
            let outcome = self.reconcile_build(job, build, tables, ctx).await?;
            match &outcome {
                BuildOutcome::Accepted {
                    pass_rate,
                    new_cases,
                    ..
                } => tracing::info!(
                    event = "build_accepted",
                    job = %job.name,
                    build,
                    pass_rate = %pass_rate,
                    new_cases
                ),
                BuildOutcome::Skipped { reason, .. } => tracing::info!(
                    event = "build_skipped",
                    job = %job.name,
                    build,
                    reason = %reason
                ),
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn reconcile_build(
        &self,
        job: &JobConfig,
        build: u32,
        tables: &mut JobTables,
        ctx: &mut ReconcileContext,
    ) -> anyhow::Result<BuildOutcome> {
        let report = match self.ci.build_test_report(&job.name, build).await? {
            Some(r) if r.case_count() > job.min_cases => r,
            other => {
                return Ok(BuildOutcome::Skipped {
                    build,
                    reason: SkipReason::NotAvailable {
                        cases: other.map(|r| r.case_count()).unwrap_or(0),
                    },
                })
            }
        };

        let info = self.ci.build_info(&job.name, build).await?;
        let rate = report.pass_rate();
        if rate < job.min_pass_rate {
            return Ok(BuildOutcome::Skipped {
                build,
                reason: SkipReason::LowPassRate { rate },
            });
        }

        let (enclosure, rack) = parse_location(&info.display_name).unwrap_or_else(|| {
            tracing::warn!(
                event = "display_name_unparsed",
                job = %job.name,
                build,
                display_name = %info.display_name
            );
            (String::new(), String::new())
        });
        if let Some(marker) = self
            .settings
            .excluded_hardware
            .iter()
            .find(|m| !m.is_empty() && enclosure.contains(m.as_str()))
        {
            tracing::debug!(event = "excluded_hardware", build, marker = %marker);
            return Ok(BuildOutcome::Skipped {
                build,
                reason: SkipReason::ExcludedHardware { enclosure },
            });
        }

        let row = build_row(build, &info, &report, enclosure, rack);
        let pass_rate = row.passrate.clone();
        tables.builds.insert(row);

        let statuses = self.collect_statuses(&report, ctx).await;
        let new_cases = tables.cases.apply_build(build, statuses).len();

        Ok(BuildOutcome::Accepted {
            build,
            pass_rate,
            new_cases,
        })
    }

    async fn collect_statuses(
        &self,
        report: &TestReport,
        ctx: &mut ReconcileContext,
    ) -> BTreeMap<String, CaseStatus> {
        let mut statuses = BTreeMap::new();
        for case in report.cases() {
            let Some(case_id) =
                extract_case_id(&case.name).or_else(|| extract_case_id(&case.class_name))
            else {
                tracing::debug!(event = "case_without_id", name = %case.name);
                continue;
            };
            statuses.insert(case_id.to_string(), CaseStatus::parse(&case.status));
            if let Some(details) = case.error_details.as_deref() {
                ctx.annotate_from_error(self.tracker, case_id, details).await;
            }
        }
        statuses
    }
}

fn build_row(
    build: u32,
    info: &BuildInfo,
    report: &TestReport,
    enclosure: String,
    rack: String,
) -> BuildRow {
    BuildRow {
        build,
        date: info
            .build_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        release: info.description.clone().unwrap_or_default(),
        enclosure,
        rack,
        pass: report.pass_count,
        fail: report.fail_count,
        skip: report.skip_count,
        passrate: format_rate(report.pass_rate()),
    }
}
