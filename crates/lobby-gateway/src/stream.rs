use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures_util::Stream;
use tracing::warn;

use crate::dispatcher::FeedSubscription;

/// Build the SSE event stream for one client connection: change-feed events
/// interleaved with heartbeat pings. The subscription and the heartbeat
/// timer are owned by the stream, so a transport close drops both — no
/// registry to unwind.
///
/// The first heartbeat fires immediately, confirming the channel to the
/// client as soon as it opens.
pub fn event_stream(
    mut feed: FeedSubscription,
    heartbeat: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut ticker = tokio::time::interval(heartbeat);

        loop {
            tokio::select! {
                ev = feed.next() => {
                    let Some(ev) = ev else { break };
                    match ev.to_json() {
                        Ok(payload) => yield Ok(Event::default().event(ev.name()).data(payload)),
                        // One bad event must not kill a live connection.
                        Err(e) => warn!("Dropping unserializable {} event: {}", ev.name(), e),
                    }
                }
                _ = ticker.tick() => {
                    yield Ok(Event::default().event("ping").data(""));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use futures_util::StreamExt;
    use uuid::Uuid;

    use lobby_types::events::StreamEvent;
    use lobby_types::models::{Message, MessageBody};

    use crate::dispatcher::Dispatcher;

    use super::event_stream;

    #[tokio::test]
    async fn degraded_stream_still_heartbeats() {
        let dispatcher = Dispatcher::disabled();
        let sub = dispatcher.subscribe(Uuid::new_v4());
        let mut stream = Box::pin(event_stream(sub, Duration::from_millis(10)));

        for _ in 0..3 {
            let item = tokio::time::timeout(Duration::from_millis(200), stream.next())
                .await
                .expect("heartbeat missed")
                .expect("stream ended");
            assert!(item.is_ok());
        }
    }

    #[tokio::test]
    async fn feed_events_reach_the_stream() {
        let dispatcher = Dispatcher::new();
        let conversation_id = Uuid::new_v4();
        let sub = dispatcher.subscribe(conversation_id);
        // Long heartbeat so the first items are real events, not pings --
        // except the immediate opening ping, which we consume first.
        let mut stream = Box::pin(event_stream(sub, Duration::from_secs(60)));

        let opening = tokio::time::timeout(Duration::from_millis(200), stream.next())
            .await
            .expect("opening ping missed");
        assert!(opening.is_some());

        dispatcher.publish(StreamEvent::MessageNew(Message {
            id: 42,
            conversation_id,
            sender_id: Uuid::new_v4(),
            body: MessageBody::Text {
                text: "ping me".into(),
                links: vec![],
            },
            created_at: Utc::now(),
        }));

        let item = tokio::time::timeout(Duration::from_millis(200), stream.next())
            .await
            .expect("event not delivered")
            .expect("stream ended");
        assert!(item.is_ok());
    }
}
