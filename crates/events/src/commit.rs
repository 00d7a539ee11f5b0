//! After-commit release of staged events.
//!
//! A unit of work stages the facts it produces with `defer`. They are handed
//! out by `commit` once the mutation is durable; `rollback`, or dropping the
//! hooks without committing, discards them so nothing is ever announced for a
//! mutation that did not happen.

use tracing::debug;

#[derive(Debug)]
pub struct CommitHooks<M> {
    pending: Vec<M>,
}

impl<M> CommitHooks<M> {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    /// Stage a message to be released on commit.
    pub fn defer(&mut self, message: M) {
        self.pending.push(message);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Release staged messages in the order they were deferred.
    pub fn commit(mut self) -> Vec<M> {
        std::mem::take(&mut self.pending)
    }

    /// Discard staged messages.
    pub fn rollback(mut self) {
        let discarded = std::mem::take(&mut self.pending).len();
        if discarded > 0 {
            debug!(discarded, "rolled back staged events");
        }
    }
}

impl<M> Default for CommitHooks<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Drop for CommitHooks<M> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            debug!(
                discarded = self.pending.len(),
                "unit of work dropped without commit; staged events discarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_releases_in_order() {
        let mut hooks = CommitHooks::new();
        hooks.defer("a");
        hooks.defer("b");
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks.commit(), vec!["a", "b"]);
    }

    #[test]
    fn rollback_releases_nothing() {
        let mut hooks = CommitHooks::new();
        assert!(hooks.is_empty());
        hooks.defer(1);
        assert!(!hooks.is_empty());
        hooks.rollback();
    }
}
