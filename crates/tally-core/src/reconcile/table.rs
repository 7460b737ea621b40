use crate::model::{BuildRow, CaseRow, CaseStatus};
use std::collections::{BTreeMap, BTreeSet};

/// Per-case results of one tracked job, one column per recorded build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseTable {
    rows: Vec<CaseRow>,
    builds: BTreeSet<u32>,
}

impl CaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from stored rows; every row is padded with `N/A` so it
    /// has a value for every build column.
    pub fn from_rows(rows: Vec<CaseRow>, builds: BTreeSet<u32>) -> Self {
        let mut table = Self { rows, builds };
        table.fill_missing();
        table
    }

    pub fn rows(&self) -> &[CaseRow] {
        &self.rows
    }

    pub fn row(&self, case_id: &str) -> Option<&CaseRow> {
        self.rows.iter().find(|r| r.case_id == case_id)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.builds.is_empty()
    }

    pub fn newest_build(&self) -> Option<u32> {
        self.builds.iter().next_back().copied()
    }

    pub fn contains_build(&self, build: u32) -> bool {
        self.builds.contains(&build)
    }

    pub fn builds_newest_first(&self) -> Vec<u32> {
        self.builds.iter().rev().copied().collect()
    }

    /// Records one build column.
    ///
    /// The first row of each known case receives its status; rows the build
    /// did not report get `N/A`. Remaining ids become new rows with `N/A` in
    /// every older column. Returns the ids of the new rows.
    pub fn apply_build(
        &mut self,
        build: u32,
        mut statuses: BTreeMap<String, CaseStatus>,
    ) -> Vec<String> {
        self.builds.insert(build);
        for row in &mut self.rows {
            let status = statuses
                .remove(&row.case_id)
                .unwrap_or(CaseStatus::NotAvailable);
            row.results.insert(build, status);
        }

        let new_ids: Vec<String> = statuses.keys().cloned().collect();
        for (case_id, status) in statuses {
            let mut row = CaseRow::new(case_id);
            row.results.insert(build, status);
            self.rows.push(row);
        }

        self.fill_missing();
        self.sort_rows();
        new_ids
    }

    fn fill_missing(&mut self) {
        for row in &mut self.rows {
            for b in &self.builds {
                row.results.entry(*b).or_insert(CaseStatus::NotAvailable);
            }
        }
    }

    fn sort_rows(&mut self) {
        self.rows.sort_by(|a, b| a.case_id.cmp(&b.case_id));
    }
}

/// Accepted builds of one job, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildTable {
    rows: Vec<BuildRow>,
}

impl BuildTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(mut rows: Vec<BuildRow>) -> Self {
        rows.sort_by(|a, b| b.build.cmp(&a.build));
        rows.dedup_by_key(|r| r.build);
        Self { rows }
    }

    pub fn rows(&self) -> &[BuildRow] {
        &self.rows
    }

    pub fn contains(&self, build: u32) -> bool {
        self.rows.iter().any(|r| r.build == build)
    }

    pub fn newest_build(&self) -> Option<u32> {
        self.rows.first().map(|r| r.build)
    }

    /// Inserts a build row. An existing row for the same build is kept.
    pub fn insert(&mut self, row: BuildRow) -> bool {
        if self.contains(row.build) {
            return false;
        }
        let pos = self
            .rows
            .iter()
            .position(|r| r.build < row.build)
            .unwrap_or(self.rows.len());
        self.rows.insert(pos, row);
        true
    }
}

/// Both sheets of one tracked job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobTables {
    pub cases: CaseTable,
    pub builds: BuildTable,
}

impl JobTables {
    /// Newest build recorded in either sheet.
    pub fn newest_build(&self) -> Option<u32> {
        match (self.cases.newest_build(), self.builds.newest_build()) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn has_build(&self, build: u32) -> bool {
        self.cases.contains_build(build) || self.builds.contains(build)
    }
}
