use super::exit_codes;
use crate::cli::args::{GlobalArgs, ReconcileArgs};
use tally_core::backlog::{backlog_sheet, collect_backlog};
use tally_core::config::load_config_or_default;
use tally_core::providers::build_http_client;
use tally_core::providers::jenkins::JenkinsClient;
use tally_core::reconcile::reconcile_workbook;
use tally_core::report::console::{print_backlog_summary, print_reconcile_summary};
use tally_core::report::xlsx::write_workbook;
use tally_core::storage::workbook::Workbook;

pub async fn run(global: &GlobalArgs, args: ReconcileArgs) -> anyhow::Result<i32> {
    let mut cfg = load_config_or_default(&global.config)?;
    cfg.reconcile.apply_overrides(args.nbuild, args.valid, None)?;
    // --job narrows what is reconciled; every job's sheets are still written back.
    let mut selected = cfg.reconcile.clone();
    selected.apply_overrides(None, None, args.job.as_deref())?;

    let creds = super::credentials(global)?;
    let client = build_http_client(&cfg.http)?;
    let jira = super::jira_client(&creds, client.clone())?;
    let jenkins_creds = creds.jenkins()?;
    let jenkins = JenkinsClient::new(
        &jenkins_creds.url,
        jenkins_creds.user_name.clone(),
        jenkins_creds.secret()?,
        client.clone(),
    );

    let input = args
        .file
        .clone()
        .unwrap_or_else(|| cfg.reconcile.workbook.clone());
    let output = args.out.clone().unwrap_or_else(|| input.clone());
    tracing::info!(
        event = "reconcile_start",
        input = %input.display(),
        output = %output.display(),
        jobs = selected.jobs.len(),
        run_limit = cfg.reconcile.run_limit
    );

    let mut workbook = Workbook::load(&input, &cfg.reconcile)?;
    let (reports, ctx) = reconcile_workbook(&jenkins, &jira, &selected, &mut workbook).await?;

    if args.backlog {
        let repo = super::testrail_client(&creds, client)?;
        let groups = &cfg.reconcile.backlog.groups;
        let stats = collect_backlog(&repo, cfg.testrail.project_id, groups).await?;
        print_backlog_summary(&stats);
        workbook.backlog = Some(backlog_sheet(&cfg.reconcile.backlog.sheet, &stats));
    }

    let issue_link = |key: &str| jira.browse_url(key);
    write_workbook(&output, &workbook, &cfg.reconcile, &ctx, Some(&issue_link))?;
    print_reconcile_summary(&reports);
    eprintln!("wrote {}", output.display());
    Ok(exit_codes::OK)
}
