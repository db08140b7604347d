use uuid::Uuid;

use crate::models::Message;

/// Events fanned out over the change feed to open client streams.
///
/// On the wire each event becomes one SSE frame: the `name()` on the
/// `event:` line, the JSON payload on the `data:` line. Heartbeats are not
/// represented here — they originate in the stream itself, not in the feed.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    MessageNew(Message),
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageNew(_) => "message.new",
        }
    }

    /// The conversation this event is scoped to; subscriptions drop events
    /// for other conversations.
    pub fn conversation_id(&self) -> Uuid {
        match self {
            Self::MessageNew(msg) => msg.conversation_id,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::MessageNew(msg) => serde_json::to_string(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::StreamEvent;
    use crate::models::{Message, MessageBody};

    #[test]
    fn message_event_carries_the_full_message() {
        let conversation_id = Uuid::new_v4();
        let event = StreamEvent::MessageNew(Message {
            id: 7,
            conversation_id,
            sender_id: Uuid::new_v4(),
            body: MessageBody::Text {
                text: "hello".into(),
                links: vec![],
            },
            created_at: Utc::now(),
        });

        assert_eq!(event.name(), "message.new");
        assert_eq!(event.conversation_id(), conversation_id);

        let payload: serde_json::Value =
            serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(payload["id"], 7);
        assert_eq!(payload["kind"], "text");
        assert_eq!(payload["text"], "hello");
    }
}
