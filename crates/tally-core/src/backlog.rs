use crate::config::BacklogGroup;
use crate::model::{format_rate, Automatable, PhysicalAccess, TestCaseRecord};
use crate::providers::TestRepository;
use crate::storage::workbook::RawSheet;
use anyhow::Context;

/// Tag values marking redfish / SES-only cases.
const REDFISH_TAGS: [i64; 2] = [6, 7];

pub const BACKLOG_LABELS: [&str; 6] = [
    "Total cases",
    "Phase one automatable",
    "Phase two automatable",
    "EOL",
    "Phase one automation rate",
    "Phase two automation rate",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseFilter {
    /// Case platform list must share at least one entry. Empty matches all.
    pub platforms: Vec<i64>,
    pub exclude_redfish: bool,
    pub automatable: Option<Automatable>,
    pub physical: Option<PhysicalAccess>,
}

impl CaseFilter {
    pub fn for_group(group: &BacklogGroup) -> Self {
        Self {
            platforms: group.platforms.clone(),
            exclude_redfish: true,
            automatable: None,
            physical: None,
        }
    }

    pub fn automatable(mut self, value: Automatable) -> Self {
        self.automatable = Some(value);
        self
    }

    pub fn physical(mut self, value: PhysicalAccess) -> Self {
        self.physical = Some(value);
        self
    }

    pub fn matches(&self, case: &TestCaseRecord) -> bool {
        if self.exclude_redfish && is_redfish(case) {
            return false;
        }
        if !self.platforms.is_empty()
            && !case.platforms().iter().any(|p| self.platforms.contains(p))
        {
            return false;
        }
        if self.automatable.is_some() && case.automatable() != self.automatable {
            return false;
        }
        if self.physical.is_some() && case.physical_access() != self.physical {
            return false;
        }
        true
    }
}

fn is_redfish(case: &TestCaseRecord) -> bool {
    matches!(case.tags.as_deref(), Some([tag]) if REDFISH_TAGS.contains(tag))
}

pub fn filter_cases<'a>(cases: &'a [TestCaseRecord], filter: &CaseFilter) -> Vec<&'a TestCaseRecord> {
    cases.iter().filter(|c| filter.matches(c)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacklogGroupStats {
    pub name: String,
    pub total: u64,
    pub phase_one: u64,
    pub phase_two: u64,
    pub eol: u64,
    pub phase_one_rate: String,
    pub phase_two_rate: String,
}

fn rate(numerator: u64, denominator: u64) -> String {
    if denominator == 0 {
        return format_rate(0.0);
    }
    format_rate(numerator as f64 / denominator as f64)
}

/// Counts one group's cases. Phase one is automatable without physical
/// access, phase two automatable with it; EOL cases count as automated.
pub fn compute_group_stats(group: &BacklogGroup, cases: &[TestCaseRecord]) -> BacklogGroupStats {
    let base = CaseFilter::for_group(group);
    let count = |f: &CaseFilter| filter_cases(cases, f).len() as u64;

    let total = count(&base);
    let phase_one = count(
        &base
            .clone()
            .automatable(Automatable::Yes)
            .physical(PhysicalAccess::NotRequired),
    );
    let phase_two = count(
        &base
            .clone()
            .automatable(Automatable::Yes)
            .physical(PhysicalAccess::Required),
    );
    let eol = group.eol;

    BacklogGroupStats {
        name: group.name.clone(),
        total,
        phase_one,
        phase_two,
        eol,
        phase_one_rate: rate(phase_one + eol, eol + total),
        phase_two_rate: rate(phase_one + phase_two + eol, eol + total),
    }
}

/// Fetches every suite of every group and computes its statistics.
pub async fn collect_backlog(
    repo: &dyn TestRepository,
    project_id: u64,
    groups: &[BacklogGroup],
) -> anyhow::Result<Vec<BacklogGroupStats>> {
    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        let mut cases = Vec::new();
        for suite in &group.suites {
            let mut page = repo
                .list_cases(project_id, *suite)
                .await
                .with_context(|| format!("backlog group {}: suite {}", group.name, suite))?;
            cases.append(&mut page);
        }
        let stats = compute_group_stats(group, &cases);
        tracing::info!(
            event = "backlog_group",
            group = %stats.name,
            total = stats.total,
            phase_one = stats.phase_one,
            phase_two = stats.phase_two,
            phase_one_rate = %stats.phase_one_rate,
            phase_two_rate = %stats.phase_two_rate
        );
        out.push(stats);
    }
    Ok(out)
}

/// Label column plus one column per group.
pub fn backlog_sheet(sheet: &str, stats: &[BacklogGroupStats]) -> RawSheet {
    let mut header = vec![String::new()];
    header.extend(stats.iter().map(|s| s.name.clone()));

    let mut rows = vec![header];
    for (i, label) in BACKLOG_LABELS.iter().enumerate() {
        let mut row = vec![label.to_string()];
        row.extend(stats.iter().map(|s| match i {
            0 => s.total.to_string(),
            1 => s.phase_one.to_string(),
            2 => s.phase_two.to_string(),
            3 => s.eol.to_string(),
            4 => s.phase_one_rate.clone(),
            _ => s.phase_two_rate.clone(),
        }));
        rows.push(row);
    }
    RawSheet {
        name: sheet.to_string(),
        rows,
    }
}
