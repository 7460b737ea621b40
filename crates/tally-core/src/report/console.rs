use crate::backlog::BacklogGroupStats;
use crate::case_sync::SyncReport;
use crate::reconcile::{BuildOutcome, JobReport};

pub fn print_sync_summary(report: &SyncReport) {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    eprintln!("\nSyncing cases created on {}{}...", report.date, mode);

    for c in &report.created {
        match &c.key {
            Some(key) => eprintln!("✅ C{:<10} suite {:<6} {}", c.case_id, c.suite_id, key),
            None => eprintln!("⏭️  C{:<10} suite {:<6} would create issue", c.case_id, c.suite_id),
        }
    }
    for f in &report.failures {
        match f.case_id {
            Some(id) => eprintln!("❌ C{:<10} suite {:<6} {}", id, f.suite_id, f.error),
            None => eprintln!("💥 suite {} listing failed: {}", f.suite_id, f.error),
        }
    }

    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!(
        "Summary: {} matched, {} created, {} failed",
        report.matched,
        report.created.iter().filter(|c| c.key.is_some()).count(),
        report.failures.len()
    );
}

pub fn print_reconcile_summary(reports: &[JobReport]) {
    let mut accepted = 0;
    let mut skipped = 0;

    for r in reports {
        let latest = r
            .latest
            .map(|n| format!("latest #{}", n))
            .unwrap_or_else(|| "no builds".into());
        eprintln!("\n{} ({})", r.job, latest);
        if r.outcomes.is_empty() {
            eprintln!("    up to date");
        }
        for outcome in &r.outcomes {
            match outcome {
                BuildOutcome::Accepted {
                    build,
                    pass_rate,
                    new_cases,
                } => {
                    accepted += 1;
                    let new = if *new_cases > 0 {
                        format!("  (+{} new cases)", new_cases)
                    } else {
                        String::new()
                    };
                    eprintln!("✅ #{:<8} {}{}", build, pass_rate, new);
                }
                BuildOutcome::Skipped { build, reason } => {
                    skipped += 1;
                    eprintln!("⏭️  #{:<8} SKIPPED ({})", build, reason);
                }
            }
        }
    }

    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!(
        "Summary: {} jobs, {} builds recorded, {} skipped",
        reports.len(),
        accepted,
        skipped
    );
}

pub fn print_backlog_summary(stats: &[BacklogGroupStats]) {
    for s in stats {
        eprintln!(
            "Backlog {:<6} total {:<5} phase one {} ({})  phase two {} ({})",
            s.name, s.total, s.phase_one, s.phase_one_rate, s.phase_two, s.phase_two_rate
        );
    }
}
