//! Cancellable periodic tickers.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Why the scheduler should look at a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// Periodic poll of the active channel.
    Active,
    /// One-shot refetch after a successful send.
    Refetch,
    /// Periodic background sweep.
    Sweep,
}

/// A tick carries the generation of the session that scheduled it so the
/// scheduler can drop ticks of a session that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub kind: TickKind,
    pub generation: u64,
}

/// Owner of a running ticker task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct PollHandle {
    cancel: CancellationToken,
}

impl PollHandle {
    /// Start a ticker that fires immediately, then every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        kind: TickKind,
        generation: u64,
        interval: Duration,
        tx: UnboundedSender<Tick>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(Tick { kind, generation }).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self { cancel }
    }

    /// Send a single tick after `delay`, unless cancelled first.
    pub fn once(kind: TickKind, generation: u64, delay: Duration, tx: UnboundedSender<Tick>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Tick { kind, generation });
                }
            }
        });
        Self { cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate_then_periodic() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = PollHandle::spawn(TickKind::Active, 7, Duration::from_secs(3), tx);

        let first = rx.recv().await.unwrap();
        assert_eq!(first, Tick { kind: TickKind::Active, generation: 7 });

        let before = tokio::time::Instant::now();
        rx.recv().await.unwrap();
        assert!(before.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticker() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = PollHandle::spawn(TickKind::Sweep, 0, Duration::from_secs(1), tx);
        rx.recv().await.unwrap();
        drop(handle);
        // The task exits and drops its sender, closing the channel
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_after_delay_unless_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _fired = PollHandle::once(TickKind::Refetch, 2, Duration::from_millis(500), tx.clone());
        let cancelled = PollHandle::once(TickKind::Refetch, 3, Duration::from_millis(500), tx);
        cancelled.cancel();
        assert!(cancelled.is_cancelled());

        let tick = rx.recv().await.unwrap();
        assert_eq!(tick.generation, 2);
        assert!(rx.recv().await.is_none());
    }
}
