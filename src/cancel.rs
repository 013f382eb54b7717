use crate::CancelToken;
use std::sync::atomic::Ordering;

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the parse holding this token at its next token boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
