use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use runbooks::config::EXAMPLE_CONFIG;
use runbooks::{run_server, util, AppState, Config};

#[derive(Parser)]
#[command(name = "runbooks")]
#[command(about = "Run runbook scripts in a persistent shell session", long_about = None)]
#[command(version)]
struct Cli {
    /// Data directory (defaults to ~/.runbooks)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(long, global = true, default_value_t = false)]
    log_stderr: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory new sessions start in
        #[arg(long)]
        working_dir: Option<PathBuf>,

        /// Where captured files are written
        #[arg(long)]
        output_path: Option<PathBuf>,

        /// Script timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Print an example configuration file
    PrintConfig,
}

fn init_logging(log_stderr: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    if log_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    // ~/.runbooks/logs/runbooks.log
    fs::create_dir_all(util::logs_dir())?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::PrintConfig) = cli.command {
        print!("{}", EXAMPLE_CONFIG);
        return Ok(());
    }

    util::init_data_dir(cli.data_dir);
    init_logging(cli.log_stderr)?;

    let mut config = Config::load();

    if let Some(Command::Serve {
        port,
        working_dir,
        output_path,
        timeout_secs,
    }) = cli.command
    {
        if let Some(port) = port {
            config = config.with_port(port);
        }
        if let Some(dir) = working_dir {
            config = config.with_working_dir(std::path::absolute(dir)?);
        }
        if let Some(path) = output_path {
            config = config.with_output_path(path);
        }
        if let Some(secs) = timeout_secs {
            config = config.with_exec_timeout(Duration::from_secs(secs));
        }
    }

    let state = AppState::new(config);
    run_server(state).await
}
