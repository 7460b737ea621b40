mod common;

use common::*;
use std::collections::BTreeMap;
use tally_core::fingerprint::table_fingerprint;
use tally_core::model::{BuildRow, CaseStatus, IssueSummary};
use tally_core::reconcile::table::JobTables;
use tally_core::reconcile::{reconcile_workbook, BuildOutcome, ReconcileContext, Reconciler, SkipReason};
use tally_core::reconcile::stats::summarize;
use tally_core::storage::workbook::Workbook;

fn healthy_report() -> tally_core::model::TestReport {
    report(
        92,
        5,
        3,
        &[
            ("test_fan_C100", "PASSED", None),
            ("test_psu_C200", "REGRESSION", Some("AssertionError: known issue JIRAFICS-4821 fan")),
            ("test_led_C300", "SKIPPED", None),
        ],
    )
}

fn seeded_tables(builds: &[u32]) -> JobTables {
    let mut tables = JobTables::default();
    for b in builds {
        let mut statuses = BTreeMap::new();
        statuses.insert("C100".to_string(), CaseStatus::Passed);
        tables.cases.apply_build(*b, statuses);
        tables.builds.insert(BuildRow {
            build: *b,
            passrate: "100.00%".into(),
            ..Default::default()
        });
    }
    tables
}

#[tokio::test]
async fn test_healthy_build_is_recorded() {
    let ci = FakeCi::new(101);
    ci.add_build(101, FKP1, healthy_report());
    let tracker = FakeTracker::default().with_issue("JIRAFICS-4821", "In Progress");
    let settings = settings();

    let mut wb = Workbook::new();
    let (reports, ctx) = reconcile_workbook(&ci, &tracker, &settings, &mut wb).await.unwrap();

    let accepted: Vec<_> = reports[0].accepted().collect();
    assert_eq!(
        accepted,
        [&BuildOutcome::Accepted {
            build: 101,
            pass_rate: "95.00%".into(),
            new_cases: 3,
        }]
    );

    let tables = wb.job("Daily_CI_DAE").unwrap();
    let row = &tables.builds.rows()[0];
    assert_eq!(row.build, 101);
    assert_eq!(row.enclosure, "fkp1");
    assert_eq!(row.rack, "rack7");
    assert_eq!(row.release, "R2.3");
    assert_eq!(row.date, "2024-05-01");
    assert_eq!((row.pass, row.fail, row.skip), (92, 5, 3));
    assert_eq!(row.passrate, "95.00%");

    assert_eq!(tables.cases.row("C200").unwrap().status(101), &CaseStatus::Failed);
    assert_eq!(tables.cases.row("C300").unwrap().status(101), &CaseStatus::Skipped);
    assert_eq!(
        ctx.known_issues.get("C200"),
        Some("JIRAFICS-4821 -- known fw issue")
    );

    // empty history starts ten builds back
    let calls = ci.report_calls.lock().unwrap();
    assert_eq!(calls.first(), Some(&92));
}

#[tokio::test]
async fn test_closed_known_issue_reads_fixed_still_fail() {
    let ci = FakeCi::new(101);
    ci.add_build(100, FKP1, healthy_report());
    ci.add_build(101, FKP1, healthy_report());
    let tracker = FakeTracker::default().with_issue("JIRAFICS-4821", "Closed");
    let settings = settings();

    let mut wb = Workbook::new();
    let (_, ctx) = reconcile_workbook(&ci, &tracker, &settings, &mut wb).await.unwrap();

    assert_eq!(
        ctx.known_issues.get("C200"),
        Some("JIRAFICS-4821 -- fixed still fail")
    );
    // resolved once, then served from the run's cache
    assert_eq!(tracker.lookups.lock().unwrap().len(), 1);

    let rows = summarize(&wb.job("Daily_CI_DAE").unwrap().cases, &ctx, settings.run_limit);
    let c200 = rows.iter().find(|r| r.case_id == "C200").unwrap();
    assert_eq!(c200.annotation, "JIRAFICS-4821 -- fixed still fail");
    assert_eq!(c200.stats.fail_total, 2);
    assert_eq!(c200.stats.pass_rate, "0.00%");
}

#[tokio::test]
async fn test_failed_lookup_leaves_case_unannotated() {
    let ci = FakeCi::new(101);
    ci.add_build(101, FKP1, healthy_report());
    let tracker = FakeTracker::default();
    let settings = settings();

    let mut wb = Workbook::new();
    let (reports, ctx) = reconcile_workbook(&ci, &tracker, &settings, &mut wb).await.unwrap();
    assert_eq!(reports[0].accepted().count(), 1);
    assert!(ctx.known_issues.is_empty());
}

#[tokio::test]
async fn test_bug_tickets_annotate_cases() {
    let ci = FakeCi::new(101);
    ci.add_build(101, FKP1, healthy_report());
    let tracker = FakeTracker {
        search_results: vec![IssueSummary {
            key: "ATOM-77".into(),
            summary: "CI bug fix C300 led blink".into(),
            status: None,
        }],
        ..Default::default()
    };
    let settings = settings();

    let mut wb = Workbook::new();
    let (_, ctx) = reconcile_workbook(&ci, &tracker, &settings, &mut wb).await.unwrap();
    let rows = summarize(&wb.job("Daily_CI_DAE").unwrap().cases, &ctx, settings.run_limit);
    let annotations: Vec<_> = rows.iter().map(|r| r.annotation.as_str()).collect();
    assert_eq!(annotations, ["no ticket", "no ticket", "ATOM-77"]);
}

#[tokio::test]
async fn test_low_rate_build_stays_excluded() {
    let ci = FakeCi::new(102);
    ci.add_build(
        102,
        FKP1,
        report(50, 50, 0, &[("a_C100", "FAILED", None), ("b_C200", "PASSED", None), ("c_C300", "PASSED", None)]),
    );
    let tracker = FakeTracker::default();
    let settings = settings();
    let job = &settings.jobs[0];
    let reconciler = Reconciler::new(&ci, &tracker, &settings);
    let mut ctx = ReconcileContext::new("JIRAFICS").unwrap();

    let mut tables = seeded_tables(&[95, 96, 97, 98, 99, 100, 101]);
    let before = table_fingerprint(&tables);

    for _ in 0..2 {
        let report = reconciler.run_job(job, &mut tables, &mut ctx).await.unwrap();
        assert_eq!(
            report.outcomes,
            [BuildOutcome::Skipped {
                build: 102,
                reason: SkipReason::LowPassRate { rate: 0.5 },
            }]
        );
        assert_eq!(table_fingerprint(&tables), before);
    }
    assert!(!tables.has_build(102));
}

#[tokio::test]
async fn test_excluded_hardware_and_thin_reports_are_skipped() {
    let ci = FakeCi::new(103);
    ci.add_build(102, FKP2, healthy_report());
    ci.add_build(103, FKP1, report(1, 0, 0, &[("only_C100", "PASSED", None)]));
    let tracker = FakeTracker::default();
    let settings = settings();
    let reconciler = Reconciler::new(&ci, &tracker, &settings);
    let mut ctx = ReconcileContext::new("JIRAFICS").unwrap();
    let mut tables = seeded_tables(&[101]);

    let (latest, outcomes) = reconciler
        .catch_up(&settings.jobs[0], &mut tables, &mut ctx)
        .await
        .unwrap();
    assert_eq!(latest, 103);
    assert_eq!(
        outcomes,
        [
            BuildOutcome::Skipped {
                build: 102,
                reason: SkipReason::ExcludedHardware {
                    enclosure: "fkp2".into()
                },
            },
            BuildOutcome::Skipped {
                build: 103,
                reason: SkipReason::NotAvailable { cases: 1 },
            },
        ]
    );
}

#[tokio::test]
async fn test_missed_build_is_backfilled() {
    let ci = FakeCi::new(103);
    ci.add_build(102, FKP1, healthy_report());
    let tracker = FakeTracker::default();
    let settings = settings();
    let reconciler = Reconciler::new(&ci, &tracker, &settings);
    let mut ctx = ReconcileContext::new("JIRAFICS").unwrap();
    let mut tables = seeded_tables(&[97, 98, 99, 100, 103]);

    let outcomes = reconciler
        .check_missed_builds(&settings.jobs[0], &mut tables, &mut ctx)
        .await
        .unwrap();
    let checked: Vec<_> = outcomes.iter().map(|o| o.build()).collect();
    assert_eq!(checked, [101, 102]);
    assert!(outcomes[1].is_accepted());

    assert_eq!(tables.cases.builds_newest_first(), [103, 102, 100, 99, 98, 97]);
    let builds: Vec<_> = tables.builds.rows().iter().map(|r| r.build).collect();
    assert_eq!(builds, [103, 102, 100, 99, 98, 97]);
    // C200 is new: older columns read N/A
    let c200 = tables.cases.row("C200").unwrap();
    assert_eq!(c200.status(102), &CaseStatus::Failed);
    assert_eq!(c200.status(103), &CaseStatus::NotAvailable);
}

#[tokio::test]
async fn test_vanished_case_is_not_available() {
    let ci = FakeCi::new(102);
    ci.add_build(101, FKP1, healthy_report());
    ci.add_build(
        102,
        FKP1,
        report(95, 0, 5, &[("a_C100", "PASSED", None), ("b_C200", "FIXED", None), ("x_C900", "PASSED", None)]),
    );
    let tracker = FakeTracker::default();
    let settings = settings();

    let mut wb = Workbook::new();
    reconcile_workbook(&ci, &tracker, &settings, &mut wb).await.unwrap();
    let cases = &wb.job("Daily_CI_DAE").unwrap().cases;
    assert_eq!(cases.row("C300").unwrap().status(102), &CaseStatus::NotAvailable);
    assert_eq!(cases.row("C200").unwrap().status(102), &CaseStatus::Passed);
    assert_eq!(cases.row("C900").unwrap().status(101), &CaseStatus::NotAvailable);
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let ci = FakeCi::new(101);
    ci.add_build(99, FKP1, healthy_report());
    ci.add_build(101, FKP1, healthy_report());
    let tracker = FakeTracker::default().with_issue("JIRAFICS-4821", "Open");
    let settings = settings();

    let mut wb = Workbook::new();
    reconcile_workbook(&ci, &tracker, &settings, &mut wb).await.unwrap();
    let first = table_fingerprint(wb.job("Daily_CI_DAE").unwrap());

    let (reports, _) = reconcile_workbook(&ci, &tracker, &settings, &mut wb).await.unwrap();
    assert_eq!(reports[0].accepted().count(), 0);
    assert_eq!(table_fingerprint(wb.job("Daily_CI_DAE").unwrap()), first);
}
