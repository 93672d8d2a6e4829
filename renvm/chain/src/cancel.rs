use {
    std::{future::Future, pin::Pin, sync::Arc},
    tokio::sync::watch,
};

/// A cloneable cancellation signal.
///
/// Cancelling a token cancels every clone and every child. Cancelling a
/// child leaves its parent alone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<watch::Sender<bool>>,
    parent: Option<Box<CancelToken>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(watch::Sender::new(false)),
            parent: None,
        }
    }

    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(watch::Sender::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.inner.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.borrow() || self.parent.as_ref().is_some_and(|parent| parent.is_cancelled())
    }

    /// Resolves once this token or any of its ancestors is cancelled.
    pub fn cancelled(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut rx = self.inner.subscribe();

            match &self.parent {
                Some(parent) => {
                    tokio::select! {
                        _ = rx.wait_for(|cancelled| *cancelled) => {},
                        _ = parent.cancelled() => {},
                    }
                },
                None => {
                    // The sender lives as long as `self`, so this can't fail.
                    let _ = rx.wait_for(|cancelled| *cancelled).await;
                },
            }
        })
    }
}
