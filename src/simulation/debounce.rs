//! Collapse bursts of edits into a single recompute.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

/// Default quiet period before a recompute
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(300);

/// Wait for the next item, then keep replacing it with newer ones until the
/// channel stays quiet for `window`. Returns None once the channel closes
/// with nothing pending.
pub async fn coalesce<T>(rx: &mut UnboundedReceiver<T>, window: Duration) -> Option<T> {
    let mut latest = rx.recv().await?;
    loop {
        match tokio::time::timeout(window, rx.recv()).await {
            Ok(Some(next)) => latest = next,
            Ok(None) | Err(_) => return Some(latest),
        }
    }
}
