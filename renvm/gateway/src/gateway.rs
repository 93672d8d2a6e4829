use {
    crate::GatewayEvent,
    futures::Stream,
    renvm_chain::CancelToken,
    renvm_types::{Direction, FeeEstimate, GatewayIdentifier, GatewayParams, Hash256},
    std::{
        pin::Pin,
        task::{Context, Poll},
    },
    tokio_stream::{StreamExt, wrappers::UnboundedReceiverStream},
};

/// An open gateway: where to deposit, and the events of every deposit made
/// there.
///
/// Dropping the handle (or calling [`Gateway::close`]) stops the watch and
/// every in-flight transfer. Their progress so far stays in the store, so
/// reopening the same parameters resumes them.
pub struct Gateway {
    pub(crate) identifier: GatewayIdentifier,
    pub(crate) params: GatewayParams,
    pub(crate) direction: Direction,
    pub(crate) fees: FeeEstimate,
    pub(crate) ghash: Hash256,
    pub(crate) events: UnboundedReceiverStream<GatewayEvent>,
    pub(crate) cancel: CancelToken,
}

impl Gateway {
    /// Where the user should send their deposit.
    pub fn identifier(&self) -> &GatewayIdentifier {
        &self.identifier
    }

    pub fn params(&self) -> &GatewayParams {
        &self.params
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn fees(&self) -> &FeeEstimate {
        &self.fees
    }

    pub fn ghash(&self) -> Hash256 {
        self.ghash
    }

    /// The next event, or `None` once the gateway is closed and every
    /// transfer task has stopped.
    pub async fn next_event(&mut self) -> Option<GatewayEvent> {
        self.events.next().await
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for Gateway {
    type Item = GatewayEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().events).poll_next(cx)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.cancel.cancel();

        #[cfg(feature = "metrics")]
        metrics::gauge!(crate::metrics::GATEWAYS_OPEN).decrement(1.0);
    }
}
