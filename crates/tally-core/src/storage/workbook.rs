use crate::config::ReconcileConfig;
use crate::model::{BuildRow, CaseRow, CaseStatus};
use crate::reconcile::table::{BuildTable, CaseTable, JobTables};
use anyhow::Context;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Seek};
use std::path::Path;

pub const CASE_ID_HEADER: &str = "caseid";
pub const KNOWN_ISSUE_HEADER: &str = "Known Issue";

/// Metadata columns of a case sheet, in order. Build columns follow.
pub const CASE_HEADERS: [&str; 7] = [
    CASE_ID_HEADER,
    KNOWN_ISSUE_HEADER,
    "Fail Total",
    "Fail Last 30",
    "Fail Last 10",
    "Pass Rate",
    "Total Runs",
];

pub const BUILD_HEADERS: [&str; 9] = [
    "build",
    "date",
    "release",
    "enclosure",
    "rack",
    "pass",
    "fail",
    "skip",
    "passrate",
];

/// A sheet kept as plain text cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// In-memory copy of the result workbook: both tables of every tracked job
/// plus the backlog sheet.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    jobs: BTreeMap<String, JobTables>,
    pub backlog: Option<RawSheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the configured sheets from `path`. Missing sheets, or a missing
    /// file, start out as empty tables.
    pub fn load(path: &Path, settings: &ReconcileConfig) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!(
                event = "workbook_missing",
                path = %path.display(),
                "workbook not found, starting with empty tables"
            );
            return Ok(Self::new());
        }

        let mut xlsx: Xlsx<_> = open_workbook(path)
            .with_context(|| format!("failed to open workbook {}", path.display()))?;
        let names = xlsx.sheet_names();

        let mut wb = Self::new();
        for job in &settings.jobs {
            let cases = match read_sheet(&mut xlsx, &names, &job.case_sheet)? {
                Some(rows) => parse_case_sheet(&rows)
                    .with_context(|| format!("sheet '{}'", job.case_sheet))?,
                None => CaseTable::new(),
            };
            let builds = match read_sheet(&mut xlsx, &names, &job.build_sheet)? {
                Some(rows) => parse_build_sheet(&rows)
                    .with_context(|| format!("sheet '{}'", job.build_sheet))?,
                None => BuildTable::new(),
            };
            tracing::debug!(
                event = "job_loaded",
                job = %job.name,
                cases = cases.rows().len(),
                builds = builds.rows().len()
            );
            wb.jobs.insert(job.name.clone(), JobTables { cases, builds });
        }

        wb.backlog = read_sheet(&mut xlsx, &names, &settings.backlog.sheet)?.map(|rows| RawSheet {
            name: settings.backlog.sheet.clone(),
            rows,
        });
        Ok(wb)
    }

    pub fn job(&self, name: &str) -> Option<&JobTables> {
        self.jobs.get(name)
    }

    pub fn job_mut(&mut self, name: &str) -> &mut JobTables {
        self.jobs.entry(name.to_string()).or_default()
    }
}

fn read_sheet<R: Read + Seek>(
    xlsx: &mut Xlsx<R>,
    names: &[String],
    sheet: &str,
) -> anyhow::Result<Option<Vec<Vec<String>>>> {
    if !names.iter().any(|n| n == sheet) {
        tracing::debug!(event = "sheet_missing", sheet = %sheet);
        return Ok(None);
    }
    let range = xlsx
        .worksheet_range(sheet)
        .with_context(|| format!("failed to read sheet '{}'", sheet))?;
    Ok(Some(range_to_rows(&range)))
}

// calamine ranges start at the first used cell; pad back to A1.
fn range_to_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    let (row0, col0) = range.start().unwrap_or((0, 0));
    let mut rows = vec![Vec::new(); row0 as usize];
    for r in range.rows() {
        let mut cells = vec![String::new(); col0 as usize];
        cells.extend(r.iter().map(cell_text));
        rows.push(cells);
    }
    rows
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) => s.chars().take(10).collect(),
        other => other.to_string(),
    }
}

fn header_index(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn cell<'r>(row: &'r [String], col: Option<usize>) -> &'r str {
    col.and_then(|c| row.get(c)).map(|s| s.trim()).unwrap_or("")
}

/// Parses a case sheet: the `caseid` column (first column if unnamed), the
/// `Known Issue` column, and every column whose header is a build number.
pub fn parse_case_sheet(rows: &[Vec<String>]) -> anyhow::Result<CaseTable> {
    let Some((header, body)) = rows.split_first() else {
        return Ok(CaseTable::new());
    };
    let id_col = header_index(header, CASE_ID_HEADER).unwrap_or(0);
    let known_col = header_index(header, KNOWN_ISSUE_HEADER);

    let build_cols: Vec<(usize, u32)> = header
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != id_col)
        .filter_map(|(i, h)| h.trim().parse::<u32>().ok().map(|b| (i, b)))
        .collect();
    let builds: BTreeSet<u32> = build_cols.iter().map(|(_, b)| *b).collect();
    if builds.len() != build_cols.len() {
        anyhow::bail!("duplicate build columns in case sheet");
    }

    let mut out = Vec::with_capacity(body.len());
    for row in body {
        let case_id = cell(row, Some(id_col));
        if case_id.is_empty() && row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let mut case = CaseRow::new(case_id);
        let known = cell(row, known_col);
        if !known.is_empty() {
            case.known_issue = Some(known.to_string());
        }
        for (col, build) in &build_cols {
            case.results
                .insert(*build, CaseStatus::parse(cell(row, Some(*col))));
        }
        out.push(case);
    }
    Ok(CaseTable::from_rows(out, builds))
}

/// Parses a build sheet by header name; rows without a build number are dropped.
pub fn parse_build_sheet(rows: &[Vec<String>]) -> anyhow::Result<BuildTable> {
    let Some((header, body)) = rows.split_first() else {
        return Ok(BuildTable::new());
    };
    let col = |name: &str| header_index(header, name);
    let build_col = col("build").context("build sheet has no 'build' column")?;
    let (date, release, enclosure, rack) = (col("date"), col("release"), col("enclosure"), col("rack"));
    let (pass, fail, skip, passrate) = (col("pass"), col("fail"), col("skip"), col("passrate"));

    let mut out = Vec::with_capacity(body.len());
    for row in body {
        let Ok(build) = cell(row, Some(build_col)).parse::<u32>() else {
            continue;
        };
        out.push(BuildRow {
            build,
            date: cell(row, date).to_string(),
            release: cell(row, release).to_string(),
            enclosure: cell(row, enclosure).to_string(),
            rack: cell(row, rack).to_string(),
            pass: cell(row, pass).parse().unwrap_or(0),
            fail: cell(row, fail).parse().unwrap_or(0),
            skip: cell(row, skip).parse().unwrap_or(0),
            passrate: cell(row, passrate).to_string(),
        });
    }
    Ok(BuildTable::from_rows(out))
}
