use super::args::*;
use tally_core::config::credentials::{load_credentials, Credentials};
use tally_core::errors::ConfigError;
use tally_core::providers::jira::JiraClient;
use tally_core::providers::testrail::TestRailClient;

pub mod reconcile;
pub mod sync_cases;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const SYNC_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::SyncCases(args) => sync_cases::run(&cli.global, args).await,
        Command::Reconcile(args) => reconcile::run(&cli.global, args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

fn credentials(global: &GlobalArgs) -> Result<Credentials, ConfigError> {
    let path = global
        .credentials_path()
        .ok_or_else(|| ConfigError("no credential file given and HOME is not set".into()))?;
    let creds = load_credentials(&path)?;
    tracing::debug!(event = "credentials_loaded", path = %path.display());
    Ok(creds)
}

fn jira_client(creds: &Credentials, client: reqwest::Client) -> Result<JiraClient, ConfigError> {
    let jira = &creds.jira;
    Ok(JiraClient::new(
        &jira.url,
        jira.agile_url.as_deref(),
        jira.user_name.clone(),
        jira.secret()?,
        client,
    ))
}

fn testrail_client(creds: &Credentials, client: reqwest::Client) -> Result<TestRailClient, ConfigError> {
    let tr = creds.testrail()?;
    Ok(TestRailClient::new(
        &tr.url,
        tr.user_name.clone(),
        tr.secret()?,
        client,
    ))
}
