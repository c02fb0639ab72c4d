//! Match start/stop signalling between the host and the sequencer.
//!
//! The host owns a [`MatchControl`]; the sequencer holds [`MatchSignals`].
//! The state only moves forward: `Init → Started → Stopped`, or straight
//! from `Init` to `Stopped` when the match is abandoned before it begins.

use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Init,
    Started,
    Stopped,
}

/// The host requested a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("match stopped by host")]
pub struct Cancelled;

/// Host side.
#[derive(Debug)]
pub struct MatchControl {
    tx: watch::Sender<MatchState>,
}

impl MatchControl {
    /// Signal the start of the match. Ignored once started or stopped.
    pub fn start(&self) {
        self.tx.send_if_modified(|state| {
            if *state == MatchState::Init {
                *state = MatchState::Started;
                true
            } else {
                false
            }
        });
    }

    /// Request a stop. Idempotent.
    pub fn stop(&self) {
        self.tx.send_if_modified(|state| {
            if *state == MatchState::Stopped {
                false
            } else {
                *state = MatchState::Stopped;
                true
            }
        });
    }

    pub fn state(&self) -> MatchState {
        *self.tx.borrow()
    }
}

/// Sequencer side. Cheap to clone; every clone observes the same state.
#[derive(Debug, Clone)]
pub struct MatchSignals {
    rx: watch::Receiver<MatchState>,
}

impl MatchSignals {
    pub fn state(&self) -> MatchState {
        *self.rx.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == MatchState::Stopped
    }

    /// Resolve when the match starts, or fail if it is stopped first.
    ///
    /// If the host drops its control without ever starting, this never
    /// resolves; the caller's phase timeout bounds it.
    pub async fn wait_for_start(&mut self) -> Result<(), Cancelled> {
        loop {
            let state = *self.rx.borrow_and_update();
            match state {
                MatchState::Started => return Ok(()),
                MatchState::Stopped => return Err(Cancelled),
                MatchState::Init => {}
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Resolve once a stop has been requested.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() == MatchState::Stopped {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a connected control/signals pair in the `Init` state.
pub fn match_signals() -> (MatchControl, MatchSignals) {
    let (tx, rx) = watch::channel(MatchState::Init);
    (MatchControl { tx }, MatchSignals { rx })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn start_releases_waiter() {
        let (control, mut signals) = match_signals();
        let waiter = tokio::spawn(async move { signals.wait_for_start().await });
        control.start();
        assert_eq!(waiter.await.expect("join"), Ok(()));
    }

    #[tokio::test]
    async fn stop_before_start_cancels_waiter() {
        let (control, mut signals) = match_signals();
        control.stop();
        assert_eq!(signals.wait_for_start().await, Err(Cancelled));
        // Start after stop is ignored.
        control.start();
        assert_eq!(control.state(), MatchState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waits_for_stop() {
        let (control, mut signals) = match_signals();
        control.start();
        let pending = tokio::time::timeout(Duration::from_millis(50), signals.cancelled()).await;
        assert!(pending.is_err(), "started is not stopped");

        control.stop();
        signals.cancelled().await;
        assert!(signals.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_control_never_cancels() {
        let (control, mut signals) = match_signals();
        drop(control);
        let pending = tokio::time::timeout(Duration::from_secs(5), signals.cancelled()).await;
        assert!(pending.is_err());
    }
}
