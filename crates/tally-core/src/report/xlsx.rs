use crate::config::ReconcileConfig;
use crate::reconcile::stats::{summarize, CaseSummary};
use crate::reconcile::table::JobTables;
use crate::reconcile::ReconcileContext;
use crate::storage::workbook::{RawSheet, Workbook, BUILD_HEADERS, CASE_HEADERS};
use anyhow::Context;
use rust_xlsxwriter::{
    ConditionalFormatCell, ConditionalFormatCellRule, ConditionalFormatText,
    ConditionalFormatTextRule, Format, Workbook as XlsxWorkbook, Worksheet,
};
use std::path::Path;

const ANNOTATION_COL: u16 = 1;
const FAIL_LAST_30_COL: u16 = 3;

struct Palette {
    header: Format,
    red: Format,
    yellow: Format,
    green: Format,
}

impl Palette {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            red: Format::new()
                .set_background_color("#FFC7CE")
                .set_font_color("#9C0006"),
            yellow: Format::new()
                .set_background_color("#FFEB9C")
                .set_font_color("#9C6500"),
            green: Format::new()
                .set_background_color("#C6EFCE")
                .set_font_color("#006100"),
        }
    }
}

/// Maps an issue key to its browse link.
pub type IssueLink<'a> = &'a dyn Fn(&str) -> String;

/// Renders every job's case and build sheet plus the backlog sheet, then
/// saves the file in one step. Ticket annotations become hyperlinks when
/// `issue_link` is given.
pub fn write_workbook(
    path: &Path,
    book: &Workbook,
    settings: &ReconcileConfig,
    ctx: &ReconcileContext,
    issue_link: Option<IssueLink<'_>>,
) -> anyhow::Result<()> {
    let palette = Palette::new();
    let mut xlsx = XlsxWorkbook::new();
    let empty = JobTables::default();

    for job in &settings.jobs {
        let tables = book.job(&job.name).unwrap_or(&empty);
        let summaries = summarize(&tables.cases, ctx, settings.run_limit);

        let sheet = xlsx.add_worksheet();
        sheet.set_name(&job.case_sheet)?;
        write_case_sheet(
            sheet,
            &tables.cases.builds_newest_first(),
            &summaries,
            &settings.ticket_prefix,
            issue_link,
            &palette,
        )?;

        let sheet = xlsx.add_worksheet();
        sheet.set_name(&job.build_sheet)?;
        write_build_sheet(sheet, tables, &palette)?;
    }

    if let Some(backlog) = &book.backlog {
        let sheet = xlsx.add_worksheet();
        sheet.set_name(&backlog.name)?;
        write_raw_sheet(sheet, backlog)?;
    }

    // Write next to the target and rename, so a failed save keeps the old file.
    let tmp = path.with_extension("xlsx.partial");
    xlsx.save(&tmp)
        .with_context(|| format!("failed to write workbook {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace workbook {}", path.display()))?;
    tracing::info!(event = "workbook_written", path = %path.display());
    Ok(())
}

fn write_case_sheet(
    sheet: &mut Worksheet,
    builds: &[u32],
    rows: &[CaseSummary],
    ticket_prefix: &str,
    issue_link: Option<IssueLink<'_>>,
    palette: &Palette,
) -> anyhow::Result<()> {
    for (col, title) in CASE_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &palette.header)?;
    }
    let first_build_col = CASE_HEADERS.len() as u16;
    for (i, build) in builds.iter().enumerate() {
        sheet.write_number_with_format(0, first_build_col + i as u16, *build, &palette.header)?;
    }

    for (i, summary) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &summary.case_id)?;

        let link = issue_link
            .filter(|_| !ticket_prefix.is_empty() && summary.annotation.starts_with(ticket_prefix));
        match link {
            Some(link) => {
                let url = link(&summary.annotation);
                sheet.write_url_with_text(row, ANNOTATION_COL, url.as_str(), &summary.annotation)?;
            }
            None => {
                sheet.write_string(row, ANNOTATION_COL, &summary.annotation)?;
            }
        }

        let stats = &summary.stats;
        sheet.write_number(row, 2, stats.fail_total)?;
        sheet.write_number(row, FAIL_LAST_30_COL, stats.fail_last_30)?;
        sheet.write_number(row, 4, stats.fail_last_10)?;
        sheet.write_string(row, 5, &stats.pass_rate)?;
        sheet.write_number(row, 6, stats.runs)?;

        for (j, status) in summary.results.iter().enumerate() {
            sheet.write_string(row, first_build_col + j as u16, status.as_str())?;
        }
    }

    if rows.is_empty() {
        return Ok(());
    }
    let last_row = rows.len() as u32;

    if !builds.is_empty() {
        let last_col = first_build_col + builds.len() as u16 - 1;
        for (text, format) in [
            ("PASSED", &palette.green),
            ("SKIPPED", &palette.yellow),
            ("FAILED", &palette.red),
        ] {
            let rule = ConditionalFormatText::new()
                .set_rule(ConditionalFormatTextRule::Contains(text.to_string()))
                .set_format(format);
            sheet.add_conditional_format(1, first_build_col, last_row, last_col, &rule)?;
        }
    }

    let mut annotation_rules = vec![("fixed", &palette.red), ("known", &palette.yellow)];
    if !ticket_prefix.is_empty() {
        annotation_rules.push((ticket_prefix, &palette.yellow));
    }
    for (text, format) in annotation_rules {
        let rule = ConditionalFormatText::new()
            .set_rule(ConditionalFormatTextRule::Contains(text.to_string()))
            .set_format(format);
        sheet.add_conditional_format(1, ANNOTATION_COL, last_row, ANNOTATION_COL, &rule)?;
    }

    let recent_failures = ConditionalFormatCell::new()
        .set_rule(ConditionalFormatCellRule::GreaterThan(1))
        .set_format(&palette.red);
    sheet.add_conditional_format(1, FAIL_LAST_30_COL, last_row, FAIL_LAST_30_COL, &recent_failures)?;
    Ok(())
}

fn write_build_sheet(sheet: &mut Worksheet, tables: &JobTables, palette: &Palette) -> anyhow::Result<()> {
    for (col, title) in BUILD_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &palette.header)?;
    }
    for (i, b) in tables.builds.rows().iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_number(row, 0, b.build)?;
        sheet.write_string(row, 1, &b.date)?;
        sheet.write_string(row, 2, &b.release)?;
        sheet.write_string(row, 3, &b.enclosure)?;
        sheet.write_string(row, 4, &b.rack)?;
        sheet.write_number(row, 5, b.pass as f64)?;
        sheet.write_number(row, 6, b.fail as f64)?;
        sheet.write_number(row, 7, b.skip as f64)?;
        sheet.write_string(row, 8, &b.passrate)?;
    }
    Ok(())
}

fn write_raw_sheet(sheet: &mut Worksheet, raw: &RawSheet) -> anyhow::Result<()> {
    for (r, cells) in raw.rows.iter().enumerate() {
        for (c, value) in cells.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            match value.parse::<f64>() {
                Ok(n) => sheet.write_number(r as u32, c as u16, n)?,
                Err(_) => sheet.write_string(r as u32, c as u16, value)?,
            };
        }
    }
    Ok(())
}
