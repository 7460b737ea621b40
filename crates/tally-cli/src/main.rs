use clap::Parser;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::args::Cli;
use cli::commands::{dispatch, exit_codes};

fn init_logging(log_level: &str, log_file: Option<&Path>) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false);

    let file = log_file.map(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| (path, e))
    });
    match file {
        Some(Ok(file)) => builder.with_writer(Mutex::new(file)).init(),
        Some(Err((path, e))) => {
            eprintln!("warning: cannot open log file {}: {}", path.display(), e);
            builder.with_writer(std::io::stderr).init()
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.global.log_level, cli.global.log_path().as_deref());

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => match tally_core::errors::find_config_error(&e) {
            Some(cfg) => {
                tracing::error!(event = "config_error", error = %cfg);
                eprintln!("config error: {}", cfg);
                exit_codes::CONFIG_ERROR
            }
            None => {
                tracing::error!(event = "fatal", error = %format!("{:#}", e));
                eprintln!("fatal: {e:?}");
                exit_codes::CONFIG_ERROR
            }
        },
    };
    std::process::exit(code);
}
