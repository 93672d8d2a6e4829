use {
    crate::{CancelToken, ChainError, OutputPayload, WaitOptions},
    anyhow::anyhow,
    async_trait::async_trait,
    renvm_types::{ChainTransaction, ExponentialBackoff},
    std::{sync::Arc, time::Duration},
    tokio::sync::{OnceCell, watch},
    tracing::{debug, warn},
};

/// How often to poll for confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl PollConfig {
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.initial, self.max, 2, None)
    }
}

/// Snapshot published while a transaction is being watched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxProgress {
    pub transaction: Option<ChainTransaction>,
    pub confirmations: u64,
    pub target: u64,
}

/// Result of waiting on a transaction. `Cancelled` and `Failed` are final
/// for the waiter that produced them.
#[derive(Debug, Clone)]
pub enum TxOutcome {
    Settled(ChainTransaction),
    Cancelled,
    Failed(ChainError),
}

/// Anything that can report how deeply a transaction is buried.
#[async_trait]
pub trait ConfirmationSource: Send + Sync {
    async fn confirmation_count(&self, tx: &ChainTransaction) -> Result<u64, ChainError>;
}

/// Observes a transaction until it reaches a confirmation target.
///
/// `wait` may be called any number of times. It only resolves as settled
/// once the transaction has at least `target` confirmations; a target that
/// was already reached returns without polling. Cancellation and failure are
/// final for every later call.
#[async_trait]
pub trait TxWaiter: Send + Sync {
    fn progress(&self) -> watch::Receiver<TxProgress>;

    async fn wait(&self, target: u64) -> TxOutcome;

    fn cancel(&self);
}

/// A [`TxWaiter`] that first has to broadcast its transaction.
#[async_trait]
pub trait TxSubmitter: TxWaiter {
    /// Broadcast the transaction. Calling this again returns the transaction
    /// from the first successful broadcast without sending anything.
    async fn submit(&self) -> Result<ChainTransaction, ChainError>;
}

// ---------------------------------- waiter -----------------------------------

/// Polls a [`ConfirmationSource`] with capped exponential backoff.
pub struct ConfirmationWaiter {
    source: Arc<dyn ConfirmationSource>,
    tx: ChainTransaction,
    poll: PollConfig,
    cancel: CancelToken,
    progress: Arc<watch::Sender<TxProgress>>,
    /// Set once the wait is cancelled or fails.
    terminal: OnceCell<TxOutcome>,
}

impl ConfirmationWaiter {
    pub fn new(source: Arc<dyn ConfirmationSource>, tx: ChainTransaction, options: WaitOptions) -> Self {
        let progress = Arc::new(watch::Sender::new(TxProgress {
            transaction: Some(tx.clone()),
            ..Default::default()
        }));

        Self::with_progress(source, tx, options, progress)
    }

    fn with_progress(
        source: Arc<dyn ConfirmationSource>,
        tx: ChainTransaction,
        options: WaitOptions,
        progress: Arc<watch::Sender<TxProgress>>,
    ) -> Self {
        progress.send_modify(|p| p.transaction = Some(tx.clone()));

        Self {
            source,
            tx,
            poll: options.poll,
            cancel: options.cancel,
            progress,
            terminal: OnceCell::new(),
        }
    }

    pub fn transaction(&self) -> &ChainTransaction {
        &self.tx
    }

    async fn poll(&self, target: u64) -> TxOutcome {
        let mut backoff = self.poll.backoff();
        let mut last = None;

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return TxOutcome::Cancelled,
                result = self.source.confirmation_count(&self.tx) => result,
            };

            match result {
                Ok(confirmations) => {
                    if last != Some(confirmations) {
                        debug!(tx = %self.tx, confirmations, target, "Confirmations updated");
                        last = Some(confirmations);
                        backoff.reset();
                    }

                    self.progress.send_modify(|p| {
                        p.confirmations = confirmations;
                        p.target = target;
                    });

                    if confirmations >= target {
                        return TxOutcome::Settled(self.tx.clone());
                    }
                },
                // A freshly broadcast transaction may not be indexed yet.
                Err(err @ ChainError::TxNotFound(_)) | Err(err @ ChainError::Transient(_)) => {
                    warn!(tx = %self.tx, error = %err, "Failed to query confirmations; retrying");
                },
                Err(err) => return TxOutcome::Failed(err),
            }

            let delay = backoff.next_delay().unwrap_or(self.poll.max);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return TxOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {},
            }
        }
    }
}

#[async_trait]
impl TxWaiter for ConfirmationWaiter {
    fn progress(&self) -> watch::Receiver<TxProgress> {
        self.progress.subscribe()
    }

    async fn wait(&self, target: u64) -> TxOutcome {
        if let Some(outcome) = self.terminal.get() {
            return outcome.clone();
        }

        let confirmations = self.progress.borrow().confirmations;
        if confirmations >= target {
            return TxOutcome::Settled(self.tx.clone());
        }

        let outcome = self.poll(target).await;

        if !matches!(outcome, TxOutcome::Settled(_)) {
            let _ = self.terminal.set(outcome.clone());
        }

        outcome
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

// --------------------------------- submitter ---------------------------------

/// The chain-specific half of a submitter: turning a payload into a
/// broadcast transaction.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, payload: &OutputPayload) -> Result<ChainTransaction, ChainError>;
}

/// Generic [`TxSubmitter`]: broadcasts once through a [`Broadcaster`] and
/// then waits on the result like a [`ConfirmationWaiter`].
pub struct BroadcastSubmitter<B> {
    broadcaster: B,
    source: Arc<dyn ConfirmationSource>,
    payload: OutputPayload,
    options: WaitOptions,
    progress: Arc<watch::Sender<TxProgress>>,
    waiter: OnceCell<ConfirmationWaiter>,
}

impl<B> BroadcastSubmitter<B>
where
    B: Broadcaster,
{
    pub fn new(
        broadcaster: B,
        source: Arc<dyn ConfirmationSource>,
        payload: OutputPayload,
        options: WaitOptions,
    ) -> Self {
        Self {
            broadcaster,
            source,
            payload,
            options,
            progress: Arc::new(watch::Sender::new(TxProgress::default())),
            waiter: OnceCell::new(),
        }
    }

    pub fn payload(&self) -> &OutputPayload {
        &self.payload
    }
}

#[async_trait]
impl<B> TxWaiter for BroadcastSubmitter<B>
where
    B: Broadcaster,
{
    fn progress(&self) -> watch::Receiver<TxProgress> {
        self.progress.subscribe()
    }

    async fn wait(&self, target: u64) -> TxOutcome {
        match self.waiter.get() {
            Some(waiter) => waiter.wait(target).await,
            None if self.options.cancel.is_cancelled() => TxOutcome::Cancelled,
            None => TxOutcome::Failed(ChainError::permanent(anyhow!(
                "transaction has not been submitted"
            ))),
        }
    }

    fn cancel(&self) {
        self.options.cancel.cancel();
    }
}

#[async_trait]
impl<B> TxSubmitter for BroadcastSubmitter<B>
where
    B: Broadcaster,
{
    async fn submit(&self) -> Result<ChainTransaction, ChainError> {
        let waiter = self
            .waiter
            .get_or_try_init(|| async {
                let tx = self.broadcaster.broadcast(&self.payload).await?;

                debug!(%tx, asset = %self.payload.asset, "Broadcast output transaction");

                Ok::<_, ChainError>(ConfirmationWaiter::with_progress(
                    self.source.clone(),
                    tx,
                    self.options.clone(),
                    self.progress.clone(),
                ))
            })
            .await?;

        Ok(waiter.transaction().clone())
    }
}

// ----------------------------------- tests -----------------------------------

#[cfg(test)]
mod tests {
    use {
        super::*,
        renvm_types::{DestinationParams, Hash256},
        std::sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    };

    /// Gains one confirmation per query.
    #[derive(Default)]
    struct Counter {
        confirmations: AtomicU64,
    }

    #[async_trait]
    impl ConfirmationSource for Counter {
        async fn confirmation_count(&self, _tx: &ChainTransaction) -> Result<u64, ChainError> {
            Ok(self.confirmations.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    /// Stuck at a fixed depth.
    struct Stuck(u64);

    #[async_trait]
    impl ConfirmationSource for Stuck {
        async fn confirmation_count(&self, _tx: &ChainTransaction) -> Result<u64, ChainError> {
            Ok(self.0)
        }
    }

    struct Failing;

    #[async_trait]
    impl ConfirmationSource for Failing {
        async fn confirmation_count(&self, _tx: &ChainTransaction) -> Result<u64, ChainError> {
            Err(ChainError::permanent(anyhow!("tx dropped from mempool")))
        }
    }

    #[derive(Default)]
    struct CountingBroadcaster {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Broadcaster for Arc<CountingBroadcaster> {
        async fn broadcast(&self, payload: &OutputPayload) -> Result<ChainTransaction, ChainError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChainTransaction::new(
                "Ethereum",
                payload.sighash.to_vec(),
                n as u32,
                "0xabc",
            ))
        }
    }

    fn options() -> WaitOptions {
        WaitOptions {
            poll: PollConfig {
                initial: Duration::from_millis(1),
                max: Duration::from_millis(5),
            },
            cancel: CancelToken::new(),
        }
    }

    fn tx() -> ChainTransaction {
        ChainTransaction::new("Bitcoin", vec![1u8; 32], 0, "0101")
    }

    fn payload() -> OutputPayload {
        OutputPayload {
            asset: "BTC".to_string(),
            selector: "BTC/toEthereum".to_string(),
            destination: DestinationParams::Address {
                to: "0x01".to_string(),
            },
            amount: 1,
            phash: Hash256::ZERO,
            nhash: Hash256::ZERO,
            sighash: Hash256::from_inner([7; 32]),
            signature: vec![1u8; 65].into(),
        }
    }

    #[tokio::test]
    async fn waiter_settles_at_target_and_memoizes() {
        let source = Arc::new(Counter::default());
        let waiter = ConfirmationWaiter::new(source.clone(), tx(), options());
        let progress = waiter.progress();

        assert!(matches!(waiter.wait(3).await, TxOutcome::Settled(t) if t == tx()));
        assert_eq!(progress.borrow().confirmations, 3);
        assert_eq!(progress.borrow().target, 3);

        // The second wait doesn't poll again.
        assert!(matches!(waiter.wait(3).await, TxOutcome::Settled(_)));
        assert_eq!(source.confirmations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn higher_target_keeps_polling() {
        let source = Arc::new(Counter::default());
        let waiter = ConfirmationWaiter::new(source.clone(), tx(), options());

        assert!(matches!(waiter.wait(2).await, TxOutcome::Settled(_)));
        assert!(matches!(waiter.wait(5).await, TxOutcome::Settled(_)));
        assert_eq!(waiter.progress().borrow().confirmations, 5);

        // Already reached.
        assert!(matches!(waiter.wait(4).await, TxOutcome::Settled(_)));
        assert_eq!(source.confirmations.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn unreached_target_does_not_settle() {
        let waiter = ConfirmationWaiter::new(Arc::new(Stuck(1)), tx(), options());

        assert!(matches!(waiter.wait(1).await, TxOutcome::Settled(_)));
        assert!(
            tokio::time::timeout(Duration::from_millis(100), waiter.wait(100))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn cancelled_waiter_stays_cancelled() {
        let waiter = ConfirmationWaiter::new(Arc::new(Counter::default()), tx(), options());
        waiter.cancel();

        assert!(matches!(waiter.wait(1_000_000).await, TxOutcome::Cancelled));
        assert!(matches!(waiter.wait(1).await, TxOutcome::Cancelled));
    }

    #[tokio::test]
    async fn permanent_error_fails_the_wait() {
        let waiter = ConfirmationWaiter::new(Arc::new(Failing), tx(), options());

        match waiter.wait(1).await {
            TxOutcome::Failed(err) => assert!(!err.is_transient()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn submitting_twice_broadcasts_once() {
        let broadcaster = Arc::new(CountingBroadcaster::default());
        let submitter = BroadcastSubmitter::new(
            broadcaster.clone(),
            Arc::new(Counter::default()),
            payload(),
            options(),
        );

        assert!(matches!(submitter.wait(1).await, TxOutcome::Failed(_)));

        let first = submitter.submit().await.unwrap();
        let second = submitter.submit().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(broadcaster.calls.load(Ordering::SeqCst), 1);

        assert!(matches!(submitter.wait(2).await, TxOutcome::Settled(t) if t == first));
        assert_eq!(submitter.progress().borrow().transaction, Some(first));
    }
}
