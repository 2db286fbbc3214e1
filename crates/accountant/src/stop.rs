use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable flag for requesting that a running simulation stop early.
///
/// Clones share the flag. The accountant polls it between events, so a
/// stop lands on an event boundary: the ledger is never left mid-update,
/// and a finalize pass still closes whatever is open.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!token.is_stopped());

        clone.stop();
        assert!(token.is_stopped());
        assert!(clone.is_stopped());
    }

    #[test]
    fn stop_is_idempotent() {
        let token = StopToken::new();
        token.stop();
        token.stop();
        assert!(token.is_stopped());
    }
}
