//! Shutdown signalling.
//!
//! A [`ShutdownSignal`] is a one-shot broadcast: any number of
//! [`ShutdownHandle`]s wait on it, and the first request wakes them all.
//! Handles subscribed after the request complete immediately.

use std::sync::Arc;

use cuneus_core::utils::Logger;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors raised while signalling shutdown.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("Shutdown already requested")]
    AlreadyRequested,

    #[error("Failed to listen for the interrupt signal: {0}")]
    Signal(#[from] std::io::Error),
}

struct Shared {
    sender: broadcast::Sender<()>,
    requested: Mutex<bool>,
    logger: Logger,
}

/// Sender side of the shutdown broadcast. Clones share the same signal.
#[derive(Clone)]
pub struct ShutdownSignal {
    shared: Arc<Shared>,
}

impl ShutdownSignal {
    /// A signal nobody has requested yet.
    pub fn new(logger: Logger) -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            shared: Arc::new(Shared {
                sender,
                requested: Mutex::new(false),
                logger,
            }),
        }
    }

    /// A handle that completes once shutdown is requested.
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            receiver: self.shared.sender.subscribe(),
            shared: self.shared.clone(),
        }
    }

    /// Request shutdown, waking every handle.
    pub fn request(&self) -> Result<(), ShutdownError> {
        {
            let mut requested = self.shared.requested.lock();
            if *requested {
                return Err(ShutdownError::AlreadyRequested);
            }
            *requested = true;
        }

        self.shared.logger.info("Shutdown requested");
        // No receivers just means nobody is waiting yet.
        let _ = self.shared.sender.send(());
        Ok(())
    }

    /// Whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        *self.shared.requested.lock()
    }

    /// Request shutdown on the first Ctrl-C.
    pub fn request_on_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    signal.shared.logger.info("Interrupt received");
                    if let Err(err) = signal.request() {
                        signal.shared.logger.warn(err);
                    }
                }
                Err(err) => signal.shared.logger.warn(ShutdownError::from(err)),
            }
        })
    }
}

/// Receiver side of the shutdown broadcast.
pub struct ShutdownHandle {
    receiver: broadcast::Receiver<()>,
    shared: Arc<Shared>,
}

impl ShutdownHandle {
    /// Wait until shutdown is requested.
    pub async fn wait(mut self) {
        let requested = *self.shared.requested.lock();
        if requested {
            return;
        }
        // A closed or lagged channel also means the signal fired.
        let _ = self.receiver.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cuneus_core::utils::LoggerFactory;
    use std::time::Duration;

    fn signal() -> ShutdownSignal {
        ShutdownSignal::new(LoggerFactory::default().logger("shutdown"))
    }

    #[tokio::test]
    async fn test_request_wakes_every_handle() {
        let signal = signal();
        let first = tokio::spawn(signal.handle().wait());
        let second = tokio::spawn(signal.handle().wait());

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.request().unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            first.await.unwrap();
            second.await.unwrap();
        })
        .await
        .expect("handles should wake up");
    }

    #[tokio::test]
    async fn test_late_handle_completes_immediately() {
        let signal = signal();
        signal.request().unwrap();
        assert!(signal.is_requested());

        tokio::time::timeout(Duration::from_millis(100), signal.handle().wait())
            .await
            .expect("late handle should not block");
    }

    #[test]
    fn test_second_request_is_refused() {
        let signal = signal();
        signal.request().unwrap();
        assert!(matches!(
            signal.clone().request(),
            Err(ShutdownError::AlreadyRequested)
        ));
    }
}
