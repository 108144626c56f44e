use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Spawns a task that waits for an interrupt (Ctrl-C) and then signals every
///  receiver of the returned watch.
///
/// Returns the join handle, the sender (for programmatic shutdown), and the receiver.
pub fn graceful_shutdown_blocker() -> (JoinHandle<()>, watch::Sender<()>, watch::Receiver<()>) {
    let (tx, rx) = watch::channel(());
    let signal_tx = tx.clone();

    let handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::debug!("interrupt received, signalling shutdown"),
            Err(e) => {
                tracing::warn!("unable to listen for interrupts: {}", e);
                return;
            }
        }
        let _ = signal_tx.send(());
    });

    (handle, tx, rx)
}

/// Registers a panic hook that logs panics using the `tracing` crate
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_programmatic_shutdown_reaches_receivers() {
        let (handle, tx, mut rx) = graceful_shutdown_blocker();
        let mut other = rx.clone();

        tx.send(()).unwrap();
        rx.changed().await.unwrap();
        other.changed().await.unwrap();

        handle.abort();
    }
}
