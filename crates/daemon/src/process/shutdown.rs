use std::io;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::http_server::HttpServerError;

/// How long in-flight requests get to finish once shutdown starts
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

type ServerTask = JoinHandle<Result<(), HttpServerError>>;

/// Owns a running server and the switch that stops it.
///
/// The switch flips on SIGINT, SIGTERM or [`ShutdownHandle::shutdown`].
/// Dropping the handle without waiting leaves the server running until a
/// signal arrives.
pub struct ShutdownHandle {
    trigger: watch::Sender<bool>,
    server: ServerTask,
    signals: JoinHandle<()>,
}

impl ShutdownHandle {
    pub(super) fn new(trigger: watch::Sender<bool>, server: ServerTask, signals: JoinHandle<()>) -> Self {
        Self {
            trigger,
            server,
            signals,
        }
    }

    /// Ask the server to stop accepting connections and drain.
    pub fn shutdown(&self) {
        self.trigger.send_replace(true);
    }

    /// Wait until the server has stopped, either because shutdown was
    /// requested or because it failed on its own.
    pub async fn wait(self) {
        let Self {
            trigger,
            mut server,
            signals,
        } = self;
        let mut stop = trigger.subscribe();

        tokio::select! {
            joined = &mut server => {
                signals.abort();
                report(joined);
                return;
            }
            _ = stop.wait_for(|stop| *stop) => {}
        }

        match tokio::time::timeout(DRAIN_TIMEOUT, &mut server).await {
            Ok(joined) => report(joined),
            Err(_) => {
                tracing::error!(
                    timeout_secs = DRAIN_TIMEOUT.as_secs(),
                    "requests still in flight, aborting server"
                );
                server.abort();
            }
        }
        signals.abort();
    }
}

fn report(joined: Result<Result<(), HttpServerError>, JoinError>) {
    match joined {
        Ok(Ok(())) => tracing::info!("server stopped"),
        Ok(Err(e)) => tracing::error!("server failed: {}", e),
        Err(e) => tracing::error!("server task ended abnormally: {}", e),
    }
}

/// Flip `trigger` on the first SIGINT or SIGTERM. The task ends early if
/// shutdown is requested some other way.
pub(super) fn listen_for_signals(trigger: watch::Sender<bool>) -> io::Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut stop = trigger.subscribe();

    Ok(tokio::spawn(async move {
        let received = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
            _ = stop.wait_for(|stop| *stop) => return,
        };
        tracing::info!(signal = received, "shutting down");
        trigger.send_replace(true);
    }))
}
