use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sift::app::AppContext;
use sift::cli::{commands, Cli, Commands, DaemonAction};
use sift::config::Config;
use sift::daemon::{self, Daemon, DaemonConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let ctx = AppContext::new(&config, None)?;

    match cli.command {
        Commands::Ingest => {
            commands::run_ingest(&ctx).await?;
        }
        Commands::Tab { tab, limit } => {
            commands::show_tab(&ctx, &tab, limit)?;
        }
        Commands::Swipe { id, action } => {
            commands::swipe(&ctx, &id, &action)?;
        }
        Commands::Status => {
            commands::status(&ctx)?;
        }
        Commands::Daemon { action } => match action {
            DaemonAction::Start {
                interval,
                no_initial_cycle,
                log,
                foreground,
            } => {
                let secs =
                    DaemonConfig::parse_interval(&interval).map_err(|e| anyhow::anyhow!(e))?;

                if !foreground {
                    spawn_detached(&interval, no_initial_cycle, log.as_deref())?;
                    return Ok(());
                }

                let daemon_config = DaemonConfig {
                    cycle_interval_secs: secs,
                    cycle_on_start: !no_initial_cycle,
                    log_file: log,
                };
                Daemon::new(Arc::new(ctx), daemon_config).run().await?;
            }
            DaemonAction::Stop => match daemon::stop_daemon() {
                Ok(()) => println!("Daemon stopped"),
                Err(e) => println!("{}", e),
            },
            DaemonAction::Status => {
                println!("{}", daemon::daemon_status());
            }
        },
    }

    Ok(())
}

/// Re-invoke the binary as a foreground daemon, detached from this
/// terminal.
fn spawn_detached(interval: &str, no_initial_cycle: bool, log: Option<&Path>) -> anyhow::Result<()> {
    use std::process::{Command, Stdio};

    if Daemon::is_running() {
        println!("Daemon is already running");
        return Ok(());
    }

    let exe = std::env::current_exe()?;
    let mut cmd = Command::new(exe);
    cmd.args(["daemon", "start", "--foreground", "--interval", interval]);
    if no_initial_cycle {
        cmd.arg("--no-initial-cycle");
    }
    if let Some(log) = log {
        cmd.arg("--log").arg(log);
    }

    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    println!("Daemon started (PID: {})", child.id());

    Ok(())
}
