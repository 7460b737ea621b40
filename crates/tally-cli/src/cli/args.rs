use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Files issues for new automatable test cases and reconciles CI results into the case workbook"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalArgs {
    /// job configuration (built-in defaults when the file is absent)
    #[arg(long, global = true, default_value = "tally.yaml")]
    pub config: PathBuf,

    /// credential file [default: ~/.tally/credentials.yaml]
    #[arg(long, global = true, env = "TALLY_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// append JSON logs here [default: ~/tally.log]
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, env = "TALLY_LOG", default_value = "info")]
    pub log_level: String,
}

impl GlobalArgs {
    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.credentials
            .clone()
            .or_else(tally_core::config::credentials::default_credentials_path)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file.clone().or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join("tally.log"))
        })
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Create tracker issues for automatable cases created on a given day
    SyncCases(SyncCasesArgs),
    /// Pull new CI builds into the case analysis workbook
    Reconcile(ReconcileArgs),
    Version,
}

#[derive(Parser, Clone, Debug)]
pub struct SyncCasesArgs {
    /// creation date to match, e.g. 2020-3-22 [default: today]
    #[arg(short, long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// log the issues that would be created without creating them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone, Debug)]
pub struct ReconcileArgs {
    /// completed runs to count per case
    #[arg(short = 'n', long)]
    pub nbuild: Option<usize>,

    /// a report needs more cases than this to be recorded
    #[arg(short = 'v', long)]
    pub valid: Option<usize>,

    /// reconcile only this job
    #[arg(short, long)]
    pub job: Option<String>,

    /// workbook to read
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// write the result here instead of over the input workbook
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// recompute the backlog sheet from the test repository
    #[arg(short, long)]
    pub backlog: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}' ({})", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_accepts_unpadded() {
        assert_eq!(
            parse_date("2020-3-22").unwrap(),
            NaiveDate::from_ymd_opt(2020, 3, 22).unwrap()
        );
        assert!(parse_date("22/03/2020").is_err());
    }

    #[test]
    fn test_reconcile_flags() {
        let cli = Cli::try_parse_from([
            "tally", "reconcile", "-n", "50", "-v", "20", "-j", "Daily_CI_DAE", "--out", "x.xlsx", "-b",
        ])
        .unwrap();
        let Command::Reconcile(args) = cli.cmd else {
            panic!("expected reconcile");
        };
        assert_eq!(args.nbuild, Some(50));
        assert_eq!(args.valid, Some(20));
        assert_eq!(args.job.as_deref(), Some("Daily_CI_DAE"));
        assert!(args.backlog);
    }
}
