//! Termination signals: `SIGINT`, `SIGTERM` and `SIGQUIT` on Unix, Ctrl-C elsewhere.

use std::io;

/// Resolves once the process is asked to terminate.
///
/// Registers fresh signal handlers on every call; fails if the platform refuses.
pub async fn wait_for_shutdown_signal() -> io::Result<()> {
    imp::first_signal().await
}

/// Like [`wait_for_shutdown_signal`], but a registration failure means
/// "no signal will ever arrive" rather than an error.
pub(crate) async fn os_shutdown() {
    if let Err(_e) = wait_for_shutdown_signal().await {
        #[cfg(feature = "logging")]
        tracing::warn!(target: "modvisor", error = %_e, "signal handlers unavailable");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
mod imp {
    use std::io;

    use tokio::signal::unix::{SignalKind, signal};

    pub(super) async fn first_signal() -> io::Result<()> {
        let mut streams = [
            signal(SignalKind::interrupt())?,
            signal(SignalKind::terminate())?,
            signal(SignalKind::quit())?,
        ];
        let [int, term, quit] = &mut streams;
        tokio::select! {
            _ = int.recv() => {}
            _ = term.recv() => {}
            _ = quit.recv() => {}
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod imp {
    pub(super) async fn first_signal() -> std::io::Result<()> {
        tokio::signal::ctrl_c().await
    }
}
