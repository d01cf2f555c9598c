// Cooperative cancellation token

use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation signal observed by a running operation between phases
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Cancellation sender
#[derive(Clone)]
pub struct CancelSender {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSender {
    /// Request cancellation; the operation stops at its next checkpoint
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Create a cancellation channel
pub fn cancel_channel() -> (CancelSender, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelSender { tx: Arc::new(tx) }, CancelToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_visible_to_all_clones() {
        let (sender, token) = cancel_channel();
        let other = token.clone();
        assert!(!token.is_cancelled());

        sender.clone().cancel();

        assert!(token.is_cancelled());
        assert!(other.is_cancelled());
    }
}
