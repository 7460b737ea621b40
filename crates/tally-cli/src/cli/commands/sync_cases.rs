use super::exit_codes;
use crate::cli::args::{GlobalArgs, SyncCasesArgs};
use tally_core::case_sync::CaseSync;
use tally_core::config::load_config_or_default;
use tally_core::providers::build_http_client;
use tally_core::report::console::print_sync_summary;

pub async fn run(global: &GlobalArgs, args: SyncCasesArgs) -> anyhow::Result<i32> {
    let cfg = load_config_or_default(&global.config)?;
    let creds = super::credentials(global)?;
    let client = build_http_client(&cfg.http)?;
    let repo = super::testrail_client(&creds, client.clone())?;
    let jira = super::jira_client(&creds, client)?;

    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    tracing::info!(event = "sync_start", date = %date, dry_run = args.dry_run);

    let report = CaseSync::new(&repo, &jira, &cfg.sync, cfg.testrail.project_id)
        .dry_run(args.dry_run)
        .run(date)
        .await;
    print_sync_summary(&report);

    if report.has_failures() {
        Ok(exit_codes::SYNC_FAILED)
    } else {
        Ok(exit_codes::OK)
    }
}
