//! # Termination signals.
//!
//! [`wait_for_shutdown_signal`] completes on the first termination signal and reports
//! which one arrived, so the shutdown event can name it.
//!
//! | platform | signals                          |
//! |----------|----------------------------------|
//! | unix     | `SIGINT`, `SIGTERM`, `SIGQUIT`   |
//! | other    | Ctrl-C                           |

/// Waits for a termination signal and returns its name.
///
/// Listeners are registered per call. Fails only if registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Waits for a termination signal and returns its name.
///
/// Listeners are registered per call. Fails only if registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
