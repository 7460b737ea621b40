pub mod annotations;
pub mod context;
pub mod engine;
pub mod stats;
pub mod table;

pub use context::ReconcileContext;
pub use engine::{BuildOutcome, JobReport, Reconciler, SkipReason};

use crate::config::ReconcileConfig;
use crate::providers::{CiServer, IssueTracker};
use crate::storage::workbook::Workbook;

/// Reconciles every configured job against the workbook, in configuration
/// order. Known-issue annotations already in the workbook are kept; CI
/// errors only annotate cases that have none. The returned context holds
/// the annotations needed to render it.
pub async fn reconcile_workbook(
    ci: &dyn CiServer,
    tracker: &dyn IssueTracker,
    settings: &ReconcileConfig,
    workbook: &mut Workbook,
) -> anyhow::Result<(Vec<JobReport>, ReconcileContext)> {
    let mut ctx = ReconcileContext::new(&settings.known_issue_prefix)?;
    if !settings.bug_query.trim().is_empty() {
        ctx.load_bug_tickets(tracker, &settings.bug_query).await?;
    }

    for job in &settings.jobs {
        if let Some(tables) = workbook.job(&job.name) {
            let seeded = ctx.seed_from_table(&tables.cases);
            tracing::debug!(event = "known_issues_seeded", job = %job.name, seeded);
        }
    }

    let reconciler = Reconciler::new(ci, tracker, settings);
    let mut reports = Vec::with_capacity(settings.jobs.len());
    for job in &settings.jobs {
        let tables = workbook.job_mut(&job.name);
        reports.push(reconciler.run_job(job, tables, &mut ctx).await?);
    }

    tracing::info!(
        event = "reconcile_done",
        jobs = reports.len(),
        known_issues = ctx.known_issues.len()
    );
    Ok((reports, ctx))
}
