use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use lobby_types::events::StreamEvent;

const FEED_CAPACITY: usize = 1024;

/// The in-process change feed. Message inserts publish here; every open
/// client stream holds a subscription filtered to its conversation.
///
/// Whether the feed is live is resolved once at construction: a disabled
/// dispatcher hands out subscriptions that never yield, leaving streams
/// heartbeat-only.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    tx: Option<broadcast::Sender<StreamEvent>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner { tx: Some(tx) }),
        }
    }

    /// Degraded mode: streams still open but carry heartbeats only.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(DispatcherInner { tx: None }),
        }
    }

    pub fn is_live(&self) -> bool {
        self.inner.tx.is_some()
    }

    /// Fan out an event to all current subscribers. A send with no
    /// listeners is not an error.
    pub fn publish(&self, event: StreamEvent) {
        if let Some(tx) = &self.inner.tx {
            let _ = tx.send(event);
        }
    }

    pub fn subscribe(&self, conversation_id: Uuid) -> FeedSubscription {
        match &self.inner.tx {
            Some(tx) => FeedSubscription::Live {
                conversation_id,
                rx: tx.subscribe(),
            },
            None => FeedSubscription::Idle,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .tx
            .as_ref()
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// One connection's view of the change feed. Dropping it releases the
/// broadcast slot — cleanup on disconnect is ownership, not bookkeeping.
pub enum FeedSubscription {
    Live {
        conversation_id: Uuid,
        rx: broadcast::Receiver<StreamEvent>,
    },
    Idle,
}

impl FeedSubscription {
    /// Next event scoped to this subscription's conversation. `None` means
    /// the feed itself shut down. Idle subscriptions pend forever.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        match self {
            Self::Live {
                conversation_id,
                rx,
            } => loop {
                match rx.recv().await {
                    Ok(ev) if ev.conversation_id() == *conversation_id => return Some(ev),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Feed subscriber lagged by {} events", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
            Self::Idle => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use uuid::Uuid;

    use lobby_types::events::StreamEvent;
    use lobby_types::models::{Message, MessageBody};

    use super::Dispatcher;

    fn message_in(conversation_id: Uuid) -> StreamEvent {
        StreamEvent::MessageNew(Message {
            id: 1,
            conversation_id,
            sender_id: Uuid::new_v4(),
            body: MessageBody::Text {
                text: "hi".into(),
                links: vec![],
            },
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn subscription_only_sees_its_conversation() {
        let dispatcher = Dispatcher::new();
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut sub = dispatcher.subscribe(mine);
        dispatcher.publish(message_in(other));
        dispatcher.publish(message_in(mine));

        let ev = sub.next().await.expect("feed closed unexpectedly");
        assert_eq!(ev.conversation_id(), mine);
    }

    #[tokio::test]
    async fn disabled_dispatcher_yields_nothing() {
        let dispatcher = Dispatcher::disabled();
        assert!(!dispatcher.is_live());

        let mut sub = dispatcher.subscribe(Uuid::new_v4());
        dispatcher.publish(message_in(Uuid::new_v4()));

        let got = tokio::time::timeout(Duration::from_millis(50), sub.next()).await;
        assert!(got.is_err(), "idle subscription must never yield");
    }

    #[tokio::test]
    async fn dropping_a_subscription_releases_its_slot() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.subscriber_count(), 0);

        let sub = dispatcher.subscribe(Uuid::new_v4());
        assert_eq!(dispatcher.subscriber_count(), 1);

        drop(sub);
        assert_eq!(dispatcher.subscriber_count(), 0);
    }
}
