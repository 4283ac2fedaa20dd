use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use seedvisor::{
    FileConfig, JobError, JobFn, JobRef, JobRegistry, LogWriter, RetryRunner, StaticLocator,
    Subscribe, SupervisorBuilder, TcpChannelConfig, wait_for_shutdown_signal,
};

#[derive(Parser)]
#[command(name = "seedvisor")]
#[command(about = "Runs scheduled sample-data jobs while the backing service is reachable")]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "seedvisor.json")]
    config: PathBuf,

    /// Log level when RUST_LOG is unset (overrides the file's loggingLevel)
    #[arg(long)]
    log_level: Option<String>,
}

const JOB_NAMES: [&str; 5] = [
    "addSampleComment",
    "addSampleRating",
    "addSampleUser",
    "addSampleVideo",
    "addSampleVideoView",
];

/// Jobs known to the binary. Their bodies only record the invocation.
fn registry() -> JobRegistry {
    JOB_NAMES
        .into_iter()
        .map(|name| -> JobRef {
            JobFn::arc(name, move |ctx: CancellationToken| async move {
                if ctx.is_cancelled() {
                    return Err(JobError::Canceled);
                }
                info!(job = name, "generating sample data");
                Ok(())
            })
        })
        .collect()
}

/// Translates level names used by older configuration files into `EnvFilter` levels.
///
/// Anything else is passed through; an unaliased `verbose` would otherwise parse as a
/// target directive and silence every record.
fn level_directive(level: &str) -> &str {
    const ALIASES: [(&str, &str); 3] = [("verbose", "debug"), ("http", "debug"), ("silly", "trace")];
    ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(level.trim()))
        .map_or(level, |(_, directive)| *directive)
}

/// Checks that the service accepts TCP connections.
async fn probe(address: &str) -> Result<(), JobError> {
    match tokio::time::timeout(Duration::from_secs(5), TcpStream::connect(address)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(JobError::fail(e)),
        Err(_) => Err(JobError::Timeout {
            timeout: Duration::from_secs(5),
        }),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let file = FileConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let level = level_directive(cli.log_level.as_deref().unwrap_or(&file.logging_level));
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{level}'"))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(level, "logging initialized");

    let cfg = file.supervisor_config();
    let mut addresses = HashMap::new();
    addresses.insert(file.service.name.clone(), file.service.address.clone());
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let sup = SupervisorBuilder::new(cfg)
        .with_registry(registry())
        .with_schedules(file.schedules.clone())
        .with_locator(Arc::new(StaticLocator::new(
            addresses,
            TcpChannelConfig::default(),
        )))
        .with_subscribers(subscribers)
        .build()
        .context("invalid schedule configuration")?;

    // Startup check; a termination signal here cancels startup.
    let startup = CancellationToken::new();
    let runner = RetryRunner::new(file.startup.retry_policy());
    let address = file.service.address.as_str();
    let checked = tokio::select! {
        res = runner.run(&startup, |_| probe(address)) => res,
        _ = wait_for_shutdown_signal() => {
            startup.cancel();
            info!("shutdown requested during startup");
            return Ok(ExitCode::SUCCESS);
        }
    };
    if let Err(e) = checked {
        error!(service = %file.service.name, error = %e, "unable to start");
        return Ok(ExitCode::FAILURE);
    }

    match sup.run_until_signal().await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!(error = %e, label = e.as_label(), "shutdown incomplete");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn legacy_level_names_map_to_filter_levels() {
        assert_eq!(level_directive("verbose"), "debug");
        assert_eq!(level_directive("Silly"), "trace");
        assert_eq!(level_directive("info"), "info");
        assert_eq!(level_directive("seedvisor=warn"), "seedvisor=warn");

        let filter = EnvFilter::try_new(level_directive("verbose")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
