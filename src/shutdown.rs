// src/shutdown.rs
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::sync::watch;

use crate::error::Cancelled;

/// Sender behind every [`Shutdown::never`]; it lives as long as the process.
static NEVER: Lazy<watch::Sender<bool>> = Lazy::new(|| watch::channel(false).0);

/// Process-wide stop signal. Cloned into every timer and invocation.
#[derive(Clone, Debug)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Owning side of [`Shutdown`]; dropping it also counts as a stop signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// A signal that never fires. Handy for one-off runs and tests.
    pub fn never() -> Self {
        Self {
            rx: NEVER.subscribe(),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown was requested (or the trigger was dropped).
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Sleep that ends early with [`Cancelled`] on shutdown.
    pub async fn sleep(&self, dur: Duration) -> Result<(), Cancelled> {
        if self.is_triggered() {
            return Err(Cancelled);
        }
        tokio::select! {
            _ = tokio::time::sleep(dur) => Ok(()),
            _ = self.wait() => Err(Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_is_cut_short_by_trigger() {
        let (trigger, shutdown) = channel();
        let s = shutdown.clone();
        let handle = tokio::spawn(async move { s.sleep(Duration::from_secs(30)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.trigger();
        let res = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sleep should end promptly")
            .unwrap();
        assert_eq!(res, Err(Cancelled));
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn never_does_not_fire() {
        let s = Shutdown::never();
        assert!(s.sleep(Duration::from_millis(5)).await.is_ok());
        assert!(!s.is_triggered());
        let waited = tokio::time::timeout(Duration::from_millis(20), s.wait()).await;
        assert!(waited.is_err(), "wait() on a never-signal must stay pending");
    }

    #[test]
    fn never_signals_share_one_sender() {
        let signals: Vec<_> = (0..100).map(|_| Shutdown::never()).collect();
        assert!(NEVER.receiver_count() >= 100);
        assert!(signals.iter().all(|s| !s.is_triggered()));
    }
}
