use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;
use tracing::warn;

pub struct Shutdown {
    sender: broadcast::Sender<()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn listen(&self) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("received shutdown signal");
            if sender.send(()).is_err() {
                warn!("no subscriber for shutdown signal");
            }
        });
    }

    // for tests and embedded usage where no os signal is involved
    pub fn trigger(&self) {
        if self.sender.send(()).is_err() {
            warn!("no subscriber for shutdown signal");
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(err) => {
            warn!("failed to listen SIGTERM, error={err}");
            if let Err(err) = signal::ctrl_c().await {
                warn!("failed to listen ctrl-c, error={err}");
            }
            return;
        }
    };
    tokio::select! {
        _ = signal::ctrl_c() => {},
        _ = terminate.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!("failed to listen ctrl-c, error={err}");
    }
}

#[cfg(test)]
mod tests {
    use super::Shutdown;

    #[tokio::test]
    async fn trigger() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        shutdown.trigger();
        assert!(signal.recv().await.is_ok());
    }
}
