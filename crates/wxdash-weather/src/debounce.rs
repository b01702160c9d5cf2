//! Debounce for `watch` channels.

use std::time::Duration;

use tokio::sync::watch;

/// Derive a receiver that only sees `input` values which stayed unchanged
/// for `delay`.
///
/// Every change restarts the timer, so a burst of updates yields only its
/// last value, published `delay` after that last update. The background task
/// exits once every derived receiver is dropped, or once `input`'s sender is
/// gone and the final value has been published.
///
/// Must be called inside a tokio runtime.
pub fn debounce<T>(mut input: watch::Receiver<T>, delay: Duration) -> watch::Receiver<T>
where
    T: Clone + Send + Sync + 'static,
{
    let initial = input.borrow_and_update().clone();
    let (tx, rx) = watch::channel(initial);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = input.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tx.closed() => return,
            }

            let mut input_closed = false;
            loop {
                tokio::select! {
                    changed = input.changed(), if !input_closed => {
                        if changed.is_err() {
                            input_closed = true;
                        }
                    }
                    _ = tokio::time::sleep(delay) => break,
                    _ = tx.closed() => return,
                }
            }

            let value = input.borrow_and_update().clone();
            if tx.send(value).is_err() || input_closed {
                return;
            }
        }
    });

    rx
}
