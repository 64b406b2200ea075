//! Cancellation-aware handoff between stages.
//!
//! Links are `mpsc` channels with a single slot, so a producer waits until the
//! consumer has taken the previous item. Every send and receive races the
//! cancellation token; cancellation wins when both are ready.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const LINK_CAPACITY: usize = 1;

/// Why a handoff did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Upstream finished, or downstream went away.
    Closed,
    /// The run's token fired while waiting.
    Cancelled,
}

pub fn link<T>() -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(LINK_CAPACITY)
}

/// Hand `item` downstream. On `Err` the caller should stop.
pub async fn send<T>(tx: &mpsc::Sender<T>, item: T, token: &CancellationToken) -> Result<(), Halt> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Halt::Cancelled),
        res = tx.send(item) => res.map_err(|_| Halt::Closed),
    }
}

/// Take the next item from upstream.
pub async fn recv<T>(rx: &mut mpsc::Receiver<T>, token: &CancellationToken) -> Result<T, Halt> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Halt::Cancelled),
        item = rx.recv() => item.ok_or(Halt::Closed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_recv_preserves_order() {
        let token = CancellationToken::new();
        let (tx, mut rx) = link();
        let producer_token = token.clone();
        let producer = tokio::spawn(async move {
            for i in 0..5 {
                assert_eq!(send(&tx, i, &producer_token).await, Ok(()));
            }
        });

        let mut got = Vec::new();
        let end = loop {
            match recv(&mut rx, &token).await {
                Ok(i) => got.push(i),
                Err(halt) => break halt,
            }
        };
        producer.await.unwrap();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
        assert_eq!(end, Halt::Closed);
    }

    #[tokio::test]
    async fn test_blocked_send_released_by_cancel() {
        let token = CancellationToken::new();
        let (tx, _rx) = link();
        assert_eq!(send(&tx, 1, &token).await, Ok(()));

        // The slot is full and nobody reads; only cancellation can release this.
        let blocked_token = token.clone();
        let blocked = tokio::spawn(async move { send(&tx, 2, &blocked_token).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let sent = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("send stayed blocked after cancel")
            .unwrap();
        assert_eq!(sent, Err(Halt::Cancelled));
    }

    #[tokio::test]
    async fn test_recv_after_cancel_is_cancelled() {
        let token = CancellationToken::new();
        let (tx, mut rx) = link();
        assert_eq!(send(&tx, 1, &token).await, Ok(()));
        token.cancel();
        assert_eq!(recv(&mut rx, &token).await, Err(Halt::Cancelled));
    }

    #[tokio::test]
    async fn test_closed_input_is_not_cancellation() {
        let token = CancellationToken::new();
        let (tx, mut rx) = link::<i64>();
        drop(tx);
        assert_eq!(recv(&mut rx, &token).await, Err(Halt::Closed));
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver_is_closed() {
        let token = CancellationToken::new();
        let (tx, rx) = link::<i64>();
        drop(rx);
        assert_eq!(send(&tx, 1, &token).await, Err(Halt::Closed));
    }
}
