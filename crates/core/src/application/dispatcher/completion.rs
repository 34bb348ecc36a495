// Dispatcher completion token

use crate::domain::{DomainError, Tally};
use tokio::sync::watch;

/// Lifecycle of a dispatcher as seen from outside
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Running,
    /// EOF seen and nothing outstanding
    Closed(Tally),
    /// Event loop stopped on a programming error
    Aborted(DomainError),
}

/// Observes the dispatcher reaching a terminal state
#[derive(Clone)]
pub struct CompletionToken {
    rx: watch::Receiver<Completion>,
}

impl CompletionToken {
    /// Check if the dispatcher has stopped (closed or aborted)
    pub fn is_closed(&self) -> bool {
        !matches!(*self.rx.borrow(), Completion::Running)
    }

    pub fn current(&self) -> Completion {
        self.rx.borrow().clone()
    }

    /// Wait for the terminal state and return the final tally
    pub async fn wait(&mut self) -> Result<Tally, DomainError> {
        let state = match self
            .rx
            .wait_for(|c| !matches!(c, Completion::Running))
            .await
        {
            Ok(state) => (*state).clone(),
            // Sender dropped without publishing a terminal state
            Err(_) => return Err(DomainError::DispatcherClosed),
        };

        match state {
            Completion::Closed(tally) => Ok(tally),
            Completion::Aborted(err) => Err(err),
            Completion::Running => Err(DomainError::DispatcherClosed),
        }
    }
}

/// Completion publisher, owned by the event loop
pub(crate) struct CompletionSender {
    tx: watch::Sender<Completion>,
}

impl CompletionSender {
    pub fn close(&self, tally: Tally) {
        let _ = self.tx.send(Completion::Closed(tally));
    }

    pub fn abort(&self, err: DomainError) {
        let _ = self.tx.send(Completion::Aborted(err));
    }
}

/// Create a completion channel
pub(crate) fn completion_channel() -> (CompletionSender, CompletionToken) {
    let (tx, rx) = watch::channel(Completion::Running);
    (CompletionSender { tx }, CompletionToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_tally_after_close() {
        let (tx, mut token) = completion_channel();
        assert!(!token.is_closed());

        tx.close(Tally { ok: 3, failed: 1 });
        assert!(token.is_closed());
        assert_eq!(token.wait().await, Ok(Tally { ok: 3, failed: 1 }));
    }

    #[tokio::test]
    async fn test_wait_reports_abort() {
        let (tx, mut token) = completion_channel();
        tx.abort(DomainError::UnknownJob("x".to_string()));
        assert_eq!(
            token.wait().await,
            Err(DomainError::UnknownJob("x".to_string()))
        );
    }

    #[tokio::test]
    async fn test_dropped_sender_does_not_hang() {
        let (tx, mut token) = completion_channel();
        drop(tx);
        assert_eq!(token.wait().await, Err(DomainError::DispatcherClosed));
    }
}
