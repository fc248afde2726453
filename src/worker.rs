//! The dispatch loop feeding subscribed messages through the requeue handler.

use crate::error::RequeueError;
use crate::pubsub::Incoming;
use crate::requeue::Requeue;
use crate::retry::get_retry_count;
use futures_util::{future, StreamExt};
use tokio_util::sync::CancellationToken;

impl Requeue {
    /// Subscribes to the source topic and requeues every message received.
    ///
    /// Successfully requeued messages are acked; failed ones are nacked so the
    /// transport redelivers the original copy. Up to `max_in_flight` messages are
    /// handled at once, with no ordering between them.
    ///
    /// A pending delay is aborted when either the message's own context or `shutdown`
    /// is cancelled. Cancelling `shutdown` also stops pulling new messages. If the
    /// subscription fails, no new messages are pulled either. In every case in-flight
    /// messages are settled before this returns.
    ///
    /// This function will run until the subscription ends, fails, or `shutdown` is
    /// cancelled. The application is responsible for reconnecting after an error.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), RequeueError> {
        log::info!("Subscribing to '{}' for requeueing...", self.subscribe_topic());

        let stream = self
            .subscriber
            .subscribe(self.subscribe_topic())
            .await
            .map_err(RequeueError::Subscribe)?;

        log::info!(
            "Requeue started on '{}' (delay: {:?}, max in flight: {}). Waiting for messages...",
            self.subscribe_topic(),
            self.delay(),
            self.max_in_flight
        );

        let mut stream_error = None;
        stream
            .take_until(shutdown.cancelled())
            .scan((), |_, delivery| {
                future::ready(match delivery {
                    Ok(incoming) => Some(incoming),
                    Err(e) => {
                        stream_error = Some(e);
                        None
                    }
                })
            })
            .for_each_concurrent(self.max_in_flight, |incoming| {
                self.handle_incoming(incoming, &shutdown)
            })
            .await;

        if let Some(e) = stream_error {
            log::error!("Subscription to '{}' failed: {}", self.subscribe_topic(), e);
            return Err(RequeueError::Subscribe(e));
        }

        if shutdown.is_cancelled() {
            log::info!("Requeue on '{}' shut down.", self.subscribe_topic());
        } else {
            log::info!("Subscription to '{}' closed.", self.subscribe_topic());
        }
        Ok(())
    }

    /// Processes one delivery and settles it with the transport.
    async fn handle_incoming(&self, incoming: Incoming, shutdown: &CancellationToken) {
        let Incoming {
            mut message,
            acknowledger,
        } = incoming;

        // `process` only watches one token: hand it a child of `shutdown` that is
        // also cancelled when the message's own context is.
        let source = message.context().clone();
        let linked = shutdown.child_token();
        message.set_context(linked.clone());

        let outcome = {
            let process = self.process(&mut message);
            tokio::pin!(process);
            tokio::select! {
                biased;
                outcome = &mut process => outcome,
                _ = source.cancelled() => {
                    linked.cancel();
                    process.await
                }
            }
        };
        message.set_context(source);

        match outcome {
            Ok(()) => {
                log::debug!(
                    "Message {} requeued (retries: {}).",
                    message.uuid,
                    get_retry_count(&message)
                );
                if let Err(e) = acknowledger.ack().await {
                    log::error!("Failed to ack message {}: {}", message.uuid, e);
                }
            }
            Err(e) => {
                log::warn!("Failed to requeue message {}, nacking: {}", message.uuid, e);
                if let Err(e) = acknowledger.nack().await {
                    log::error!("Failed to nack message {}: {}", message.uuid, e);
                }
            }
        }
    }
}
