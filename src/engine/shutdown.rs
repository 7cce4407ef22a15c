// src/engine/shutdown.rs

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Broadcast-once shutdown flag.
///
/// Requesting shutdown more than once is harmless; every subscriber, past or
/// future, observes it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn request(&self) {
        let was_requested = self.tx.send_replace(true);
        if !was_requested {
            info!("shutdown requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown has been requested.
    pub async fn recv(&mut self) {
        if self.rx.wait_for(|requested| *requested).await.is_err() {
            // Sender gone without ever requesting shutdown: never fires.
            std::future::pending::<()>().await;
        }
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }
}
