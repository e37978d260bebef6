use hearth::cli::{self, Invocation};
use hearth::config::{Config, Session};
use hearth::confirm_ui::ConfirmationUI;
use hearth::driver::SessionDriver;
use hearth::error::HearthError;
use hearth::history::HistoryStore;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let invocation = match cli::parse_args(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(HearthError::Configuration(message)) => {
            error!("Invalid command line");
            eprint!("{}", message);
            return ExitCode::from(1);
        }
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    match run(invocation).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(invocation: Invocation) -> anyhow::Result<i32> {
    let mode = match invocation {
        Invocation::Help(usage) => {
            print!("{}", usage);
            return Ok(0);
        }
        Invocation::ShowConfig => {
            let (config, status) = Config::load_with_status()?;
            config.show_config_info(&status)?;
            return Ok(0);
        }
        Invocation::ShowHistory(count) => {
            let config = Config::load()?;
            let entries = HistoryStore::new(config.history_path).recent_entries(count)?;
            ConfirmationUI::new().show_history_with_io(&entries, &mut std::io::stdout())?;
            return Ok(0);
        }
        Invocation::Run(mode) => mode,
    };

    let session = Session::from_config(Config::load()?, mode);
    info!("Starting session: {:?} with model '{}'", session.mode, session.model);

    let mut driver = SessionDriver::start(&session).await?;
    driver.run(&session.mode).await
}
