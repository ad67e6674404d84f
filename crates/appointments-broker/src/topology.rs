//! Topic and consumer-group naming.

use std::time::Duration;

/// Default topic carrying appointment events.
pub const DEFAULT_EVENTS_TOPIC: &str = "appointment-events";

/// Default dead-letter topic for events the projector cannot apply.
pub const DEFAULT_DEAD_LETTER_TOPIC: &str = "appointment-events.dlq";

/// Default consumer group shared by projector instances.
pub const DEFAULT_CONSUMER_GROUP: &str = "appointment-projector";

/// Where the pipeline's messages live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerTopology {
    /// Comma-separated bootstrap servers.
    pub brokers: String,
    /// Topic the command service publishes to.
    pub events_topic: String,
    /// Topic dead letters are written to.
    pub dead_letter_topic: String,
    /// Consumer group of the projection workers.
    pub consumer_group: String,
    /// How long a publish may wait for broker acknowledgement.
    pub publish_timeout: Duration,
}

impl BrokerTopology {
    /// Topology with default names for the given bootstrap servers.
    #[must_use]
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            events_topic: DEFAULT_EVENTS_TOPIC.to_owned(),
            dead_letter_topic: DEFAULT_DEAD_LETTER_TOPIC.to_owned(),
            consumer_group: DEFAULT_CONSUMER_GROUP.to_owned(),
            publish_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_names() {
        let topology = BrokerTopology::new("localhost:9092");

        assert_eq!(topology.brokers, "localhost:9092");
        assert_eq!(topology.events_topic, "appointment-events");
        assert_eq!(topology.dead_letter_topic, "appointment-events.dlq");
        assert_eq!(topology.consumer_group, "appointment-projector");
    }
}
