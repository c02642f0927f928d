// Idle teardown timer
// At most one timer is live per session. Arming always cancels the previous one
// first, and each arm gets a fresh generation so a firing that was already in
// the mailbox when the timer got cancelled can be told apart and dropped.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::events::SessionMessage;
use crate::engine::SessionKey;

struct ArmedTimer {
    generation: u64,
    token: CancellationToken,
}

pub(crate) struct IdleTimer {
    key: SessionKey,
    window: Duration,
    generation: u64,
    armed: Option<ArmedTimer>,
    notify: mpsc::UnboundedSender<SessionMessage>,
}

impl IdleTimer {
    pub(crate) fn new(key: SessionKey, window: Duration, notify: mpsc::UnboundedSender<SessionMessage>) -> Self {
        Self {
            key,
            window,
            generation: 0,
            armed: None,
            notify,
        }
    }

    /// Cancel-then-set: (re)start the countdown from now
    pub(crate) fn arm(&mut self) {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let notify = self.notify.clone();
        let window = self.window;

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(window) => {
                    let _ = notify.send(SessionMessage::IdleElapsed { generation });
                }
            }
        });

        debug!("Idle timer armed for guild {} ({:?}, generation {})", self.key, window, generation);
        self.armed = Some(ArmedTimer { generation, token });
    }

    /// Safe to call any number of times
    pub(crate) fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.token.cancel();
            debug!("Idle timer cancelled for guild {} (generation {})", self.key, armed.generation);
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// True when `generation` is the live timer; it is consumed so it can only fire once
    pub(crate) fn claim(&mut self, generation: u64) -> bool {
        match &self.armed {
            Some(armed) if armed.generation == generation => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elapsed_generation(message: SessionMessage) -> u64 {
        match message {
            SessionMessage::IdleElapsed { generation } => generation,
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_window() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = IdleTimer::new(SessionKey(1), Duration::from_secs(420), tx);

        timer.arm();
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_secs(419)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let generation = elapsed_generation(rx.recv().await.unwrap());
        assert!(timer.claim(generation));
        assert!(!timer.is_armed());
        assert!(!timer.claim(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = IdleTimer::new(SessionKey(1), Duration::from_secs(10), tx);

        timer.arm();
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_restarts_window_and_invalidates_old_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = IdleTimer::new(SessionKey(1), Duration::from_secs(10), tx);

        timer.arm();
        tokio::time::sleep(Duration::from_secs(8)).await;
        timer.arm();

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(3)).await;
        let generation = elapsed_generation(rx.recv().await.unwrap());
        assert_eq!(generation, 2);
        assert!(!timer.claim(1));
        assert!(timer.claim(2));
    }
}
