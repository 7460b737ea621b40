use super::annotations::resolve_annotation;
use super::context::ReconcileContext;
use super::table::CaseTable;
use crate::model::{format_rate, CaseStatus};

/// Rolling failure counters of one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseStats {
    pub fail_total: u32,
    pub fail_last_30: u32,
    pub fail_last_10: u32,
    pub runs: u32,
    pub pass_rate: String,
}

/// Computes counters over results ordered newest first.
///
/// Only completed runs (`PASSED`, `FAILED`, `BLOCKED`) count; the 10- and
/// 30-run windows are measured in completed runs. Counting stops once
/// `run_limit` runs have been seen.
pub fn compute_stats<'a, I>(newest_first: I, run_limit: usize) -> CaseStats
where
    I: IntoIterator<Item = &'a CaseStatus>,
{
    let mut runs = 0u32;
    let mut fail_total = 0u32;
    let mut fail_last_10 = 0u32;
    let mut fail_last_30 = 0u32;

    for status in newest_first {
        if runs as usize >= run_limit {
            break;
        }
        if !status.is_run() {
            continue;
        }
        runs += 1;
        if status.is_failure() {
            fail_total += 1;
            if runs <= 10 {
                fail_last_10 += 1;
            }
            if runs <= 30 {
                fail_last_30 += 1;
            }
        }
    }

    let ratio = if runs == 0 {
        0.0
    } else {
        f64::from(runs - fail_total) / f64::from(runs)
    };

    CaseStats {
        fail_total,
        fail_last_30,
        fail_last_10,
        runs,
        pass_rate: format_rate(ratio),
    }
}

/// Derived columns of one case row, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSummary {
    pub case_id: String,
    pub annotation: String,
    pub stats: CaseStats,
    /// Results aligned with `CaseTable::builds_newest_first`.
    pub results: Vec<CaseStatus>,
}

pub fn summarize(table: &CaseTable, ctx: &ReconcileContext, run_limit: usize) -> Vec<CaseSummary> {
    let builds = table.builds_newest_first();
    table
        .rows()
        .iter()
        .map(|row| {
            let results: Vec<CaseStatus> = builds.iter().map(|b| row.status(*b).clone()).collect();
            CaseSummary {
                case_id: row.case_id.clone(),
                annotation: resolve_annotation(&row.case_id, &ctx.known_issues, &ctx.bug_tickets)
                    .to_string(),
                stats: compute_stats(&results, run_limit),
                results,
            }
        })
        .collect()
}
