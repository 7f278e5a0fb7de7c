use convoy::{Routable, RoutingKey};

/// Inbound chat event addressed to a bot, a channel, and a user target.
///
/// The routing key is `bot_id::channel::target`, so all traffic for one
/// conversation is serialized while distinct conversations run freely.
#[derive(Clone, Debug)]
pub struct ChatEvent {
    pub bot_id: String,
    pub channel: String,
    pub target: String,
    /// Free-form marker used by tests to tell deliveries apart.
    pub preview: String,
}

impl ChatEvent {
    pub fn new(
        bot_id: impl Into<String>,
        channel: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            channel: channel.into(),
            target: target.into(),
            preview: String::new(),
        }
    }

    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = preview.into();
        self
    }
}

impl Routable for ChatEvent {
    fn routing_key(&self) -> RoutingKey {
        RoutingKey::new(format!(
            "{}::{}::{}",
            self.bot_id, self.channel, self.target
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_joins_bot_channel_target() {
        let event = ChatEvent::new("bot1", "web", "u1");
        assert_eq!(event.routing_key().as_str(), "bot1::web::u1");
    }

    #[test]
    fn same_conversation_shares_a_key() {
        let a = ChatEvent::new("bot1", "web", "u1").with_preview("hello");
        let b = ChatEvent::new("bot1", "web", "u1").with_preview("again");
        let other = ChatEvent::new("bot1", "web", "u2");

        assert_eq!(a.routing_key(), b.routing_key());
        assert_ne!(a.routing_key(), other.routing_key());
    }
}
