use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc::{self, Receiver, error::TrySendError};
use tracing::{debug, warn};

use crate::broadcast::BroadcastRegistry;
use crate::changes::ChangeRecord;
use crate::store::Payload;

/// Per-subscription channel capacity. A subscriber that falls this far
/// behind starts losing notifications.
const WATCH_CHANNEL_CAPACITY: usize = 100;

/// A channel-backed subscription to a [`SignalMap`].
///
/// Opening a subscription registers a forwarding callback with the broadcast
/// registry under the subscription's id; every `(key, record)` pair a write
/// produces is cloned into a bounded channel for the consumer to receive at
/// its own pace. Dropping the handle unregisters the callback.
///
/// Delivery through the channel is asynchronous: the consumer observes
/// changes with a delay, and if the channel is full the notification for
/// this subscriber is dropped. Components that must see every change
/// synchronously should use [`SignalMap::subscribe`] instead.
///
/// The id is available through [`id`], so a consumer that also writes to the
/// map can pass it to the `*_except` writers and skip its own echo.
///
/// [`SignalMap`]: crate::SignalMap
/// [`SignalMap::subscribe`]: crate::SignalMap::subscribe
/// [`id`]: Self::id
pub struct Subscription<K, V> {
    id: String,
    registry: Arc<BroadcastRegistry<Payload<K, V>>>,
    receiver: Receiver<(K, ChangeRecord<V>)>,
}

impl<K, V> Subscription<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn open(registry: &Arc<BroadcastRegistry<Payload<K, V>>>, id: String) -> Self {
        let (sender, receiver) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

        let callback_id = id.clone();
        registry.register(id.clone(), move |(key, record): &Payload<K, V>| {
            match sender.try_send((key.clone(), record.clone())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = %callback_id, "watch channel full, dropping change notification");
                }
                // Receiver already gone; unregistration happens on drop.
                Err(TrySendError::Closed(_)) => {}
            }
        });
        debug!(subscriber = %id, "opened watch subscription");

        Self {
            id,
            registry: Arc::clone(registry),
            receiver,
        }
    }

    /// The subscriber id this subscription is registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Receives the next `(key, record)` pair.
    ///
    /// Returns `None` once the subscription has been unregistered and the
    /// channel drained.
    pub async fn recv(&mut self) -> Option<(K, ChangeRecord<V>)> {
        self.receiver.recv().await
    }

    /// Mutable access to the underlying receiver, for callers that want to
    /// poll or `try_recv` directly.
    pub fn receiver_mut(&mut self) -> &mut Receiver<(K, ChangeRecord<V>)> {
        &mut self.receiver
    }

    /// Converts the subscription into a stream of `(key, record)` pairs.
    ///
    /// The subscription stays registered for as long as the stream is alive
    /// and unregisters when the stream is dropped.
    pub fn into_stream(self) -> impl Stream<Item = (K, ChangeRecord<V>)> {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|payload| (payload, subscription))
        })
    }
}

impl<K, V> Drop for Subscription<K, V> {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
        debug!(subscriber = %self.id, "closed watch subscription");
    }
}

impl<K, V> std::fmt::Debug for Subscription<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
