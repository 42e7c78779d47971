//! Copies one admin message to every known user, one at a time.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl BroadcastReport {
    pub fn summary(&self) -> String {
        let title = if self.cancelled {
            "🛑 Broadcast cancelled:"
        } else {
            "✅ Broadcast complete:"
        };
        format!("{title}\n✔️ {} sent\n❌ {} failed.", self.sent, self.failed)
    }
}

/// Tracks the one broadcast that may run at a time.
#[derive(Default)]
pub struct Broadcaster {
    active: Mutex<Option<CancellationToken>>,
}

impl Broadcaster {
    /// The slot only ever holds a whole token, so a panic elsewhere while it
    /// was locked cannot leave it half-written.
    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new broadcast, or returns `None` while another is running.
    pub fn begin(&self) -> Option<CancellationToken> {
        let mut active = self.slot();
        if active.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return None;
        }
        let token = CancellationToken::new();
        *active = Some(token.clone());
        Some(token)
    }

    pub fn is_running(&self) -> bool {
        self.slot().as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Returns whether a running broadcast was stopped.
    pub fn cancel(&self) -> bool {
        match self.slot().take() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Clears the slot once `token`'s broadcast has ended.
    pub fn finish(&self, token: &CancellationToken) {
        token.cancel();
        // A newer broadcast in the slot is never cancelled, so only ours is cleared.
        let mut active = self.slot();
        if active.as_ref().is_some_and(|t| t.is_cancelled()) {
            *active = None;
        }
    }
}

/// Sends to each target with `delay` between sends until done or cancelled.
pub async fn run<F, Fut, E>(
    targets: Vec<u64>,
    delay: Duration,
    token: CancellationToken,
    mut send: F,
) -> BroadcastReport
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut report = BroadcastReport::default();
    info!("Broadcasting to {} users", targets.len());

    for (index, user_id) in targets.into_iter().enumerate() {
        if index > 0 {
            tokio::select! {
                _ = token.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        } else if token.is_cancelled() {
            report.cancelled = true;
            break;
        }

        match send(user_id).await {
            Ok(()) => report.sent += 1,
            Err(err) => {
                warn!("Broadcast to {} failed: {}", user_id, err);
                report.failed += 1;
            }
        }
    }

    info!("Broadcast finished: {:?}", report);
    report
}
