//! Cancellation for polling loops
//!
//! Loops take an optional `watch::Receiver<bool>`; flipping it to `true`
//! stops the loop at its next check. A dropped sender never cancels.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Receiver side of a cancellation switch
pub type CancelSignal = watch::Receiver<bool>;

/// Current state of the switch, without waiting
pub fn is_cancelled(cancel: &Option<CancelSignal>) -> bool {
    cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
}

/// Sleep for `duration`, returning `true` if cancelled first
pub async fn sleep_or_cancel(duration: Duration, cancel: &mut Option<CancelSignal>) -> bool {
    match cancel {
        None => {
            tokio::time::sleep(duration).await;
            false
        }
        Some(rx) => tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = wait_for_cancel(rx) => true,
        },
    }
}

/// Run `fut` unless the switch flips first; `None` means cancelled.
///
/// The future is dropped on cancellation, so an in-flight request is
/// abandoned rather than awaited.
pub async fn or_cancel<F: Future>(fut: F, cancel: &mut Option<CancelSignal>) -> Option<F::Output> {
    match cancel {
        None => Some(fut.await),
        Some(rx) => tokio::select! {
            output = fut => Some(output),
            _ = wait_for_cancel(rx) => None,
        },
    }
}

async fn wait_for_cancel(rx: &mut CancelSignal) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_without_signal() {
        let mut cancel = None;
        assert!(!sleep_or_cancel(Duration::from_millis(1), &mut cancel).await);
        assert!(!is_cancelled(&cancel));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let (tx, rx) = watch::channel(false);
        let mut cancel = Some(rx);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
            tx
        });

        assert!(sleep_or_cancel(Duration::from_secs(30), &mut cancel).await);
        assert!(is_cancelled(&cancel));
        drop(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_or_cancel_abandons_stuck_future() {
        let (tx, rx) = watch::channel(false);
        let mut cancel = Some(rx);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
            tx
        });

        let stuck = std::future::pending::<u32>();
        assert_eq!(or_cancel(stuck, &mut cancel).await, None);
        assert_eq!(or_cancel(async { 7 }, &mut None).await, Some(7));
    }

    #[tokio::test]
    async fn test_dropped_sender_does_not_cancel() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let mut cancel = Some(rx);
        assert!(!sleep_or_cancel(Duration::from_millis(5), &mut cancel).await);
    }
}
